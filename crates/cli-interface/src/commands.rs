//! Command execution
//!
//! Maps parsed `models` subcommands onto [`ModelManager`] calls and renders
//! the results as plain lines.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use common::error::Error;
use common::models::ModelEntry;
use model_manager::{catalog, AddOptions, ModelManager, VerifyOutcome};

use crate::cli::ModelsCommand;
use crate::formatters;

/// Exit code for a successful command
pub const EXIT_OK: i32 = 0;
/// Exit code for failures without a more specific code
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for invalid arguments and configuration
pub const EXIT_USAGE: i32 = 2;
/// Exit code when a model key or model file does not exist
pub const EXIT_NOT_FOUND: i32 = 3;
/// Exit code when a key is already registered
pub const EXIT_DUPLICATE: i32 = 4;
/// Exit code when a model file cannot be read
pub const EXIT_UNREADABLE: i32 = 5;
/// Exit code when no key was given and no default is set
pub const EXIT_NO_MODEL: i32 = 6;
/// Exit code when the registry lock could not be acquired
pub const EXIT_LOCKED: i32 = 7;
/// Exit code when verification found invalid models
pub const EXIT_INVALID: i32 = 8;
/// Exit code after Ctrl-C
pub const EXIT_CANCELLED: i32 = 130;

/// How a successful command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Everything is fine
    Success,
    /// The command ran, but this many models failed verification
    InvalidModels(usize),
}

impl CommandOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandOutcome::Success => EXIT_OK,
            CommandOutcome::InvalidModels(_) => EXIT_INVALID,
        }
    }
}

/// Maps an error to a process exit code
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<Error>() {
        Some(Error::ModelNotFound { .. }) | Some(Error::FileNotFound { .. }) => EXIT_NOT_FOUND,
        Some(Error::DuplicateKey { .. }) => EXIT_DUPLICATE,
        Some(Error::Unreadable { .. }) => EXIT_UNREADABLE,
        Some(Error::NoModelSelected) => EXIT_NO_MODEL,
        Some(Error::LockTimeout { .. }) => EXIT_LOCKED,
        Some(Error::IntegrityMismatch { .. }) => EXIT_INVALID,
        Some(Error::Cancelled(_)) => EXIT_CANCELLED,
        Some(Error::InvalidArgument(_)) | Some(Error::Config(_)) => EXIT_USAGE,
        Some(Error::Io(_)) | Some(Error::Serialization(_)) | None => EXIT_FAILURE,
    }
}

/// Runs model commands against one manager
pub struct CommandManager {
    /// Model manager
    manager: Arc<ModelManager>,
}

impl CommandManager {
    /// Creates a new command manager
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }

    /// The underlying model manager
    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Executes a command, writing its output to `out`
    pub fn execute(&self, command: &ModelsCommand, out: &mut dyn Write) -> Result<CommandOutcome> {
        debug!("Executing {:?}", command);

        match command {
            ModelsCommand::Add {
                key,
                path,
                default,
                name,
                checksum,
            } => self.add(key, path, *default, name.as_deref(), *checksum, out),
            ModelsCommand::Remove { key } => self.remove(key, out),
            ModelsCommand::List { json } => self.list(*json, out),
            ModelsCommand::Use { key } => self.use_model(key, out),
            ModelsCommand::Show { key, json } => self.show(key.as_deref(), *json, out),
            ModelsCommand::Verify => self.verify(out),
            ModelsCommand::Refresh { key, checksum } => self.refresh(key, *checksum, out),
            ModelsCommand::Catalog => self.catalog(out),
        }
    }

    fn add(
        &self,
        key: &str,
        path: &Path,
        default: bool,
        name: Option<&str>,
        checksum: bool,
        out: &mut dyn Write,
    ) -> Result<CommandOutcome> {
        let options = AddOptions {
            display_name: name.map(str::to_string),
            set_default: default,
            // Without the flag the configured behavior applies
            checksum: checksum.then_some(true),
        };

        let entry = self
            .manager
            .add_model_with_options(key, path, options)
            .with_context(|| format!("Failed to add model '{}'", key))?;

        writeln!(
            out,
            "Added {} ({}){}",
            entry.key,
            entry.path.display(),
            if entry.is_default { " as default" } else { "" }
        )?;
        if let Some(checksum) = &entry.checksum {
            writeln!(out, "sha256 {}", checksum)?;
        }

        Ok(CommandOutcome::Success)
    }

    fn remove(&self, key: &str, out: &mut dyn Write) -> Result<CommandOutcome> {
        let entry = self
            .manager
            .remove_model(key)
            .with_context(|| format!("Failed to remove model '{}'", key))?;

        writeln!(out, "Removed {}; {} was kept", entry.key, entry.path.display())?;
        if entry.is_default {
            writeln!(out, "No default model is set now")?;
        }

        Ok(CommandOutcome::Success)
    }

    fn list(&self, json: bool, out: &mut dyn Write) -> Result<CommandOutcome> {
        let entries = self.manager.list_models();

        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
            return Ok(CommandOutcome::Success);
        }

        if entries.is_empty() {
            writeln!(out, "No models registered. Add one with `scli models add <key> <path>`")?;
            return Ok(CommandOutcome::Success);
        }

        for entry in &entries {
            writeln!(out, "{}", formatters::entry_line(entry))?;
        }

        Ok(CommandOutcome::Success)
    }

    fn use_model(&self, key: &str, out: &mut dyn Write) -> Result<CommandOutcome> {
        let entry = self
            .manager
            .set_default(key)
            .with_context(|| format!("Failed to set default model '{}'", key))?;

        writeln!(out, "Default model is now {}", entry.key)?;

        Ok(CommandOutcome::Success)
    }

    fn show(&self, key: Option<&str>, json: bool, out: &mut dyn Write) -> Result<CommandOutcome> {
        let entry: ModelEntry = self.manager.select_model(key)?;

        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&entry)?)?;
        } else {
            for line in formatters::entry_details(&entry) {
                writeln!(out, "{}", line)?;
            }
        }

        Ok(CommandOutcome::Success)
    }

    fn verify(&self, out: &mut dyn Write) -> Result<CommandOutcome> {
        let results = self.manager.revalidate_all_detailed();

        if results.is_empty() {
            writeln!(out, "No models registered")?;
            return Ok(CommandOutcome::Success);
        }

        if results.values().any(|o| matches!(o, VerifyOutcome::Interrupted)) {
            return Err(Error::Cancelled("verification interrupted".to_string()).into());
        }

        for (key, outcome) in &results {
            writeln!(out, "{}", formatters::outcome_line(key, outcome))?;
        }

        let invalid = results.values().filter(|o| !o.is_valid()).count();
        if invalid == 0 {
            Ok(CommandOutcome::Success)
        } else {
            writeln!(out, "{} of {} models are invalid", invalid, results.len())?;
            Ok(CommandOutcome::InvalidModels(invalid))
        }
    }

    fn refresh(&self, key: &str, checksum: bool, out: &mut dyn Write) -> Result<CommandOutcome> {
        let entry = self
            .manager
            .refresh_model(key, checksum)
            .with_context(|| format!("Failed to refresh model '{}'", key))?;

        writeln!(out, "{}", formatters::entry_line(&entry))?;

        Ok(CommandOutcome::Success)
    }

    fn catalog(&self, out: &mut dyn Write) -> Result<CommandOutcome> {
        for model in catalog::available_models() {
            for line in formatters::catalog_lines(model) {
                writeln!(out, "{}", line)?;
            }
        }

        Ok(CommandOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_manager::ModelManagerSettings;
    use std::fs;
    use tempfile::TempDir;

    fn commands(dir: &TempDir) -> CommandManager {
        let settings = ModelManagerSettings::new(dir.path().join("registry.json"));
        CommandManager::new(Arc::new(ModelManager::new(settings)))
    }

    fn run(commands: &CommandManager, command: ModelsCommand) -> (Result<CommandOutcome>, String) {
        let mut out = Vec::new();
        let result = commands.execute(&command, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    fn add(key: &str, path: &Path, default: bool) -> ModelsCommand {
        ModelsCommand::Add {
            key: key.to_string(),
            path: path.to_path_buf(),
            default,
            name: None,
            checksum: false,
        }
    }

    #[test]
    fn test_add_list_use_show() {
        let dir = TempDir::new().unwrap();
        let commands = commands(&dir);
        let phi3 = dir.path().join("phi3.gguf");
        let tiny = dir.path().join("tiny.gguf");
        fs::write(&phi3, b"GGUF phi3").unwrap();
        fs::write(&tiny, b"GGUF tiny").unwrap();

        let (result, output) = run(&commands, add("phi3", &phi3, true));
        assert_eq!(result.unwrap(), CommandOutcome::Success);
        assert!(output.contains("as default"));

        run(&commands, add("tiny", &tiny, false)).0.unwrap();

        let (_, output) = run(&commands, ModelsCommand::List { json: false });
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* phi3"));
        assert!(lines[1].starts_with("  tiny"));

        run(&commands, ModelsCommand::Use { key: "tiny".into() }).0.unwrap();

        let (_, output) = run(&commands, ModelsCommand::Show { key: None, json: false });
        assert!(output.contains("key:       tiny"));
        assert!(output.contains("default:   yes"));
    }

    #[test]
    fn test_list_json_is_parseable() {
        let dir = TempDir::new().unwrap();
        let commands = commands(&dir);
        let path = dir.path().join("m.gguf");
        fs::write(&path, b"GGUF").unwrap();
        run(&commands, add("m", &path, false)).0.unwrap();

        let (_, output) = run(&commands, ModelsCommand::List { json: true });
        let parsed: Vec<ModelEntry> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].key, "m");
    }

    #[test]
    fn test_verify_reports_missing_files() {
        let dir = TempDir::new().unwrap();
        let commands = commands(&dir);
        let path = dir.path().join("gone.gguf");
        fs::write(&path, b"GGUF").unwrap();
        run(&commands, add("gone", &path, false)).0.unwrap();
        fs::remove_file(&path).unwrap();

        let (result, output) = run(&commands, ModelsCommand::Verify);
        let outcome = result.unwrap();
        assert_eq!(outcome, CommandOutcome::InvalidModels(1));
        assert_eq!(outcome.exit_code(), EXIT_INVALID);
        assert!(output.contains("INVALID gone: file missing"));
    }

    #[test]
    fn test_errors_map_to_exit_codes() {
        let dir = TempDir::new().unwrap();
        let commands = commands(&dir);

        let (result, _) = run(&commands, ModelsCommand::Remove { key: "nope".into() });
        assert_eq!(exit_code(&result.unwrap_err()), EXIT_NOT_FOUND);

        let (result, _) = run(&commands, ModelsCommand::Show { key: None, json: false });
        assert_eq!(exit_code(&result.unwrap_err()), EXIT_NO_MODEL);

        let (result, _) = run(&commands, add("x", &dir.path().join("missing.gguf"), false));
        assert_eq!(exit_code(&result.unwrap_err()), EXIT_NOT_FOUND);

        let (result, _) = run(&commands, add("dir", dir.path(), false));
        assert_eq!(exit_code(&result.unwrap_err()), EXIT_NOT_FOUND);

        let (result, _) = run(&commands, add("bad key", &dir.path().join("m.gguf"), false));
        assert_eq!(exit_code(&result.unwrap_err()), EXIT_USAGE);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), EXIT_FAILURE);
    }

    #[test]
    fn test_duplicate_add_exit_code() {
        let dir = TempDir::new().unwrap();
        let commands = commands(&dir);
        let path = dir.path().join("m.gguf");
        fs::write(&path, b"GGUF").unwrap();

        run(&commands, add("m", &path, false)).0.unwrap();
        let (result, _) = run(&commands, add("m", &path, false));
        assert_eq!(exit_code(&result.unwrap_err()), EXIT_DUPLICATE);
    }

    #[test]
    fn test_catalog_lists_every_model() {
        let dir = TempDir::new().unwrap();
        let (result, output) = run(&commands(&dir), ModelsCommand::Catalog);
        result.unwrap();
        for model in catalog::available_models() {
            assert!(output.contains(model.key));
        }
    }
}
