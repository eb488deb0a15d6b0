// Command line tool for serialized state files

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use state_serde::{CodecConfig, Envelope, Result, Scope, StateSerde};
use tempfile::NamedTempFile;

#[derive(Parser, Debug)]
#[command(name = "state-serde", version, about = "Inspect and re-key serialized state files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print how many secrets, schemas and dates a state file holds
    Inspect {
        file: PathBuf,
    },
    /// Re-encrypt every secret in a state file under a new password
    Rekey {
        file: PathBuf,
        #[arg(long, env = "STATE_SERDE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "STATE_SERDE_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
        /// Write here instead of overwriting the input file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a state file with all secrets decrypted
    Reveal {
        file: PathBuf,
        #[arg(long, env = "STATE_SERDE_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Tag counts of an envelope tree.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    secrets: usize,
    schemas: usize,
    dates: usize,
}

fn summarize(envelope: &Envelope) -> Summary {
    let mut summary = Summary::default();
    envelope.walk(&mut |node| match node {
        Envelope::Secret(_) => summary.secrets += 1,
        Envelope::Schema(_) => summary.schemas += 1,
        Envelope::Date(_) => summary.dates += 1,
        _ => {}
    });
    summary
}

async fn read_envelope(path: &Path) -> Result<Envelope> {
    let text = tokio::fs::read_to_string(path).await?;
    Envelope::from_json_str(&text)
}

/// Writes `contents` through a temporary file in the target's directory and
/// renames it into place, so a failed write never truncates the target.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.as_file_mut().write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

async fn rekey(
    state: &StateSerde,
    input: &Path,
    password: &str,
    new_password: &str,
    output: &Path,
) -> Result<Summary> {
    let envelope = read_envelope(input).await?;
    let old_scope = Scope::new("rekey").with_password(password);
    let new_scope = Scope::new("rekey").with_password(new_password);

    let rekeyed = state.rekey(&envelope, &old_scope, &new_scope).await?;
    write_atomic(output, &rekeyed.to_json_string()?)?;

    Ok(summarize(&rekeyed))
}

async fn reveal(state: &StateSerde, input: &Path, password: &str) -> Result<String> {
    let envelope = read_envelope(input).await?;
    let scope = Scope::new("reveal").with_password(password);

    state.reveal(&envelope, &scope).await?.to_json_string_pretty()
}

async fn run(cli: Cli) -> Result<()> {
    let state = StateSerde::with_config(&CodecConfig::from_env()?);

    match cli.command {
        Command::Inspect { file } => {
            let summary = summarize(&read_envelope(&file).await?);
            println!("secrets: {}", summary.secrets);
            println!("schemas: {}", summary.schemas);
            println!("dates:   {}", summary.dates);
        }
        Command::Rekey {
            file,
            password,
            new_password,
            output,
        } => {
            let output = output.unwrap_or_else(|| file.clone());
            let summary = rekey(&state, &file, &password, &new_password, &output).await?;
            log::info!(
                "Re-keyed {} secret(s) from {} into {}",
                summary.secrets,
                file.display(),
                output.display()
            );
        }
        Command::Reveal { file, password } => {
            println!("{}", reveal(&state, &file, &password).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()).await {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use state_serde::{EncryptionStrategy, SchemaType, Secret, SerializeOptions, Value};

    fn fast_state() -> StateSerde {
        StateSerde::with_config(&CodecConfig {
            strategy: EncryptionStrategy::AesGcm,
            pbkdf2_iterations: 1_000,
        })
    }

    #[test]
    fn test_summarize() {
        let envelope = Envelope::from_json_str(
            r#"{"a":{"@secret":"x"},"b":[{"@date":"2024-01-01T00:00:00.000Z"},{"@secret":"y"}],"c":{"@schema":{}}}"#,
        )
        .unwrap();
        assert_eq!(
            summarize(&envelope),
            Summary {
                secrets: 2,
                schemas: 1,
                dates: 1
            }
        );
    }

    #[tokio::test]
    async fn test_rekey_and_reveal() {
        let state = fast_state();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("state.json");
        let output = dir.path().join("rekeyed.json");

        let value = Value::object()
            .with("token", Secret::new("abc"))
            .with("shape", Value::schema(SchemaType::Array(Box::new(SchemaType::String))))
            .with("created", Utc.timestamp_millis_opt(253_402_300_800_000).unwrap());
        let text = state
            .serialize_to_string(&Scope::new("t").with_password("old"), &value, SerializeOptions::default())
            .await
            .unwrap();
        std::fs::write(&input, text).unwrap();
        let before = summarize(&read_envelope(&input).await.unwrap());

        let summary = rekey(&state, &input, "old", "new", &output).await.unwrap();
        assert_eq!(
            summary,
            Summary {
                secrets: 1,
                schemas: 1,
                dates: 1
            }
        );
        assert_eq!(summarize(&read_envelope(&output).await.unwrap()), before);

        // The old password no longer opens the re-keyed file
        assert!(reveal(&state, &output, "old").await.is_err());

        let revealed = reveal(&state, &output, "new").await.unwrap();
        assert!(revealed.contains(r#""@secret": "abc""#));
        assert!(revealed.contains(r#""@schema": {"#));
        assert!(revealed.contains(r#""@date": "+010000-01-01T00:00:00.000Z""#));
    }

    #[tokio::test]
    async fn test_rekey_in_place_replaces_file() {
        let state = fast_state();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("state.json");

        let value = Value::object().with("token", Secret::new("abc"));
        let text = state
            .serialize_to_string(&Scope::new("t").with_password("old"), &value, SerializeOptions::default())
            .await
            .unwrap();
        std::fs::write(&input, &text).unwrap();

        // A wrong password leaves the input untouched
        assert!(rekey(&state, &input, "wrong", "new", &input).await.is_err());
        assert_eq!(std::fs::read_to_string(&input).unwrap(), text);

        rekey(&state, &input, "old", "new", &input).await.unwrap();
        assert!(reveal(&state, &input, "new").await.is_ok());

        // No temporary files are left next to the state file
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "old contents that are longer").unwrap();

        write_atomic(&path, "{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
