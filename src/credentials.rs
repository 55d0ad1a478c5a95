//! Credential file I/O and interactive prompting
//!
//! The credentials file holds three plaintext lines in fixed order:
//! API id, API hash, phone number. When it is absent the fields are
//! collected through a [`PromptInput`] and written back.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: String,
    pub api_hash: String,
    pub phone: String,
}

impl Credentials {
    /// The API id as Telegram expects it.
    pub fn api_id_number(&self) -> Result<i32> {
        self.api_id
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("API id '{}' is not a number", self.api_id)))
    }
}

/// Source of interactive answers: stdin in production, scripted in tests.
/// Also used for the login code and two-step password during sign-in.
pub trait PromptInput {
    fn prompt(&mut self, label: &str) -> Result<String>;
}

/// Reads answers from standard input.
pub struct StdinPrompt;

impl PromptInput for StdinPrompt {
    fn prompt(&mut self, label: &str) -> Result<String> {
        print!("{}: ", label);
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// Load credentials from a three-line file.
///
/// A missing or unreadable file counts as absent. A file that exists but
/// has fewer than three lines is a hard error.
pub fn load(path: &Path) -> Result<Option<Credentials>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Ok(None),
    };

    let mut lines = content.lines().map(|line| line.trim().to_string());
    match (lines.next(), lines.next(), lines.next()) {
        (Some(api_id), Some(api_hash), Some(phone)) => Ok(Some(Credentials {
            api_id,
            api_hash,
            phone,
        })),
        _ => Err(Error::MalformedCredentials(path.display().to_string())),
    }
}

/// Write the three fields in fixed order, one per line.
pub fn save(path: &Path, credentials: &Credentials) -> Result<()> {
    let content = format!(
        "{}\n{}\n{}\n",
        credentials.api_id, credentials.api_hash, credentials.phone
    );
    fs::write(path, content)?;
    Ok(())
}

/// Load credentials, prompting for and saving them when absent.
pub fn load_or_prompt(path: &Path, prompts: &mut impl PromptInput) -> Result<Credentials> {
    if let Some(credentials) = load(path)? {
        return Ok(credentials);
    }

    let credentials = Credentials {
        api_id: prompts.prompt("Enter your API ID")?,
        api_hash: prompts.prompt("Enter your API Hash")?,
        phone: prompts.prompt("Enter your Phone Number")?,
    };
    save(path, &credentials)?;
    info!(path = %path.display(), "saved credentials");

    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct ScriptedPrompt {
        answers: Vec<String>,
    }

    impl ScriptedPrompt {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().rev().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl PromptInput for ScriptedPrompt {
        fn prompt(&mut self, _label: &str) -> Result<String> {
            Ok(self.answers.pop().expect("scripted answer"))
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("credentials.txt");

        let credentials = Credentials {
            api_id: "1".to_string(),
            api_hash: "abc".to_string(),
            phone: "+100".to_string(),
        };

        save(&path, &credentials).expect("save");
        let loaded = load(&path).expect("load").expect("present");
        assert_eq!(loaded, credentials);
    }

    #[test]
    fn missing_file_is_absent() {
        let temp = tempdir().expect("tempdir");
        let loaded = load(&temp.path().join("nope.txt")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn short_file_is_a_hard_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("credentials.txt");
        fs::write(&path, "123\nhash_only\n").expect("write");

        let err = load(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedCredentials(_)));
    }

    #[test]
    fn load_trims_whitespace() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("credentials.txt");
        fs::write(&path, "  123 \nabc\t\n +100\n").expect("write");

        let loaded = load(&path).expect("load").expect("present");
        assert_eq!(loaded.api_id, "123");
        assert_eq!(loaded.api_hash, "abc");
        assert_eq!(loaded.phone, "+100");
    }

    #[test]
    fn prompt_fallback_saves_the_answers() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("credentials.txt");
        let mut prompts = ScriptedPrompt::new(&["42", "deadbeef", "+490000"]);

        let credentials = load_or_prompt(&path, &mut prompts).expect("load or prompt");
        assert_eq!(credentials.api_id, "42");
        assert_eq!(credentials.phone, "+490000");

        // Second call reads the file, no prompting left.
        let mut empty = ScriptedPrompt::new(&[]);
        let reloaded = load_or_prompt(&path, &mut empty).expect("reload");
        assert_eq!(reloaded, credentials);
    }

    #[test]
    fn api_id_number_parses_or_fails() {
        let good = Credentials {
            api_id: "12345".to_string(),
            api_hash: "h".to_string(),
            phone: "+1".to_string(),
        };
        assert_eq!(good.api_id_number().unwrap(), 12345);

        let bad = Credentials {
            api_id: "not-a-number".to_string(),
            api_hash: "h".to_string(),
            phone: "+1".to_string(),
        };
        assert!(bad.api_id_number().is_err());
    }
}
