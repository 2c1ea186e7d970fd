//! # Input Validation Module
//!
//! Validation applied to every externally sourced string before it
//! reaches a process spawn, an SSH session, or the Docker Engine.

use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use regex::Regex;

/// Characters which are never allowed in commands or arguments,
/// since nothing is ever run through a shell and their presence
/// always indicates an injection attempt.
pub const SHELL_METACHARACTERS: &[char] =
  &[';', '|', '&', '`', '$', '<', '>', '\n', '\0'];

/// Maximum byte length of a single free-form argument.
pub const MAX_ARG_BYTES: usize = 500;

/// Commands which may be executed on a host through the generic
/// exec surfaces. The first token of a raw command must be a member.
pub const COMMAND_ALLOW_LIST: &[&str] = &[
  "cat", "df", "dmesg", "docker", "du", "echo", "file", "find",
  "findmnt", "free", "grep", "head", "hostname", "ip", "journalctl",
  "ls", "nproc", "ps", "sha256sum", "ss", "stat", "systemctl",
  "tail", "tar", "uname", "uptime", "wc", "zfs", "zpool",
];

/// Tokenizes a raw command string on whitespace, rejecting it if the
/// first token is not allow-listed or any token contains a shell
/// metacharacter. Returns the token list for vector execution.
pub fn validate_command(
  command: &str,
) -> anyhow::Result<Vec<String>> {
  let tokens = command
    .split_whitespace()
    .map(str::to_string)
    .collect::<Vec<_>>();

  let Some(program) = tokens.first() else {
    return Err(anyhow!("Command is empty"));
  };

  if !COMMAND_ALLOW_LIST.contains(&program.as_str()) {
    return Err(anyhow!(
      "Command '{program}' is not in the allowed command list"
    ));
  }

  for token in &tokens {
    reject_shell_tokens(token)
      .with_context(|| format!("Invalid token '{token}'"))?;
  }

  Ok(tokens)
}

/// Vets a free-form argument vector: no shell metacharacters,
/// no oversized arguments, no embedded newlines or NUL bytes.
pub fn validate_args(args: &[String]) -> anyhow::Result<()> {
  for arg in args {
    if arg.len() > MAX_ARG_BYTES {
      return Err(anyhow!(
        "Argument exceeds {MAX_ARG_BYTES} bytes"
      ));
    }
    reject_shell_tokens(arg)
      .with_context(|| format!("Invalid argument '{arg}'"))?;
  }
  Ok(())
}

fn reject_shell_tokens(input: &str) -> anyhow::Result<()> {
  for c in SHELL_METACHARACTERS {
    if input.contains(*c) {
      return Err(anyhow!(
        "Contains disallowed character '{}'",
        c.escape_default()
      ));
    }
  }
  Ok(())
}

/// Requires an absolute path containing only `[A-Za-z0-9._-/]`,
/// with no `.` / `..` segments and no NUL bytes. Returns the
/// canonical form (duplicate separators collapsed).
pub fn validate_secure_path(path: &str) -> anyhow::Result<String> {
  if path.is_empty() {
    return Err(anyhow!("Path is empty"));
  }
  if !path.starts_with('/') {
    return Err(anyhow!("Path must be absolute"));
  }
  if path.contains('\0') {
    return Err(anyhow!("Path contains NUL byte"));
  }

  for c in path.chars() {
    if !(c.is_ascii_alphanumeric()
      || matches!(c, '.' | '_' | '-' | '/'))
    {
      return Err(anyhow!(
        "Path contains disallowed character '{}'",
        c.escape_default()
      ));
    }
  }

  // Empty segments (duplicate '/') are collapsed silently, explicit
  // '.' / '..' segments are rejected.
  let mut canonical = Vec::new();
  for segment in path.split('/') {
    match segment {
      "" => continue,
      "." => {
        return Err(anyhow!("Path contains '.' segment"));
      }
      ".." => {
        return Err(anyhow!("Path contains traversal segment '..'"));
      }
      segment => canonical.push(segment),
    }
  }

  Ok(format!("/{}", canonical.join("/")))
}

/// Options to validate input strings to have certain properties.
/// This ensures only valid identifiers can enter the system.
///
/// ## Usage
///
/// ```ignore
/// StringValidator::default()
///   .max_length(100)
///   .matches(StringValidatorMatches::ProjectName)
///   .validate("plex")?
/// ```
#[derive(Default)]
pub struct StringValidator {
  /// Specify max length of string, or None to allow arbitrary length.
  pub max_length: Option<usize>,
  /// Specify a pattern to validate the string contents.
  pub matches: Option<StringValidatorMatches>,
}

impl StringValidator {
  /// Returns Ok if input passes validations, otherwise includes
  /// error with failure reason.
  pub fn validate(&self, input: &str) -> anyhow::Result<()> {
    if input.is_empty() {
      return Err(anyhow!("Input is empty"));
    }

    if let Some(max_length) = self.max_length
      && input.len() > max_length
    {
      return Err(anyhow!(
        "Input too long. Must be at most {max_length} characters."
      ));
    }

    validate_no_control_chars(input)?;

    if let Some(matches) = &self.matches {
      matches.validate(input)?
    }

    Ok(())
  }

  pub fn max_length(
    mut self,
    max_length: impl Into<Option<usize>>,
  ) -> StringValidator {
    self.max_length = max_length.into();
    self
  }

  pub fn matches(
    mut self,
    matches: impl Into<Option<StringValidatorMatches>>,
  ) -> StringValidator {
    self.matches = matches.into();
    self
  }
}

pub enum StringValidatorMatches {
  /// - alphanumeric characters, underscores, hyphens
  /// - must start with an alphanumeric
  HostName,
  /// - alphanumeric characters, underscores, hyphens, dots
  /// - must start with an alphanumeric (no leading dot)
  ProjectName,
  /// Same shape as project names.
  ServiceName,
  /// Container name or id prefix.
  ContainerRef,
  /// - image references: alphanumerics plus `._-/:`
  /// - must start with an alphanumeric
  ImageRef,
}

impl StringValidatorMatches {
  /// Returns Ok if input passes validations, otherwise includes
  /// error with failure reason.
  fn validate(&self, input: &str) -> anyhow::Result<()> {
    let validate = || match self {
      StringValidatorMatches::HostName => {
        static HOST_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = HOST_NAME_REGEX.get_or_init(|| {
          Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$")
            .expect("Failed to initialize host name regex")
        });
        if regex.is_match(input) {
          Ok(())
        } else {
          Err(anyhow!(
            "Only alphanumeric characters, underscores, and hyphens are allowed"
          ))
        }
      }

      StringValidatorMatches::ProjectName
      | StringValidatorMatches::ServiceName
      | StringValidatorMatches::ContainerRef => {
        static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = NAME_REGEX.get_or_init(|| {
          Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$")
            .expect("Failed to initialize name regex")
        });
        if regex.is_match(input) {
          Ok(())
        } else {
          Err(anyhow!(
            "Only alphanumeric characters, underscores, hyphens, and dots are allowed, and the first character must be alphanumeric"
          ))
        }
      }

      StringValidatorMatches::ImageRef => {
        static IMAGE_REF_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = IMAGE_REF_REGEX.get_or_init(|| {
          Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._/:-]*$")
            .expect("Failed to initialize image ref regex")
        });
        if regex.is_match(input) {
          Ok(())
        } else {
          Err(anyhow!(
            "Only alphanumeric characters and `._-/:` are allowed, and the first character must be alphanumeric"
          ))
        }
      }
    };
    validate().context("Invalid characters in input")
  }
}

fn validate_no_control_chars(input: &str) -> anyhow::Result<()> {
  for (index, char) in input.chars().enumerate() {
    if char.is_control() {
      return Err(anyhow!(
        "Control character at index {index}. Input: \"{input}\""
      ));
    }
  }
  Ok(())
}

/// Host names: letters, digits, `-`, `_`.
pub fn validate_host_name(name: &str) -> anyhow::Result<()> {
  StringValidator::default()
    .max_length(100)
    .matches(StringValidatorMatches::HostName)
    .validate(name)
    .context("Invalid host name")
}

/// Compose project names.
pub fn validate_project_name(name: &str) -> anyhow::Result<()> {
  StringValidator::default()
    .max_length(100)
    .matches(StringValidatorMatches::ProjectName)
    .validate(name)
    .context("Invalid project name")
}

/// Compose service names.
pub fn validate_service_name(name: &str) -> anyhow::Result<()> {
  StringValidator::default()
    .max_length(100)
    .matches(StringValidatorMatches::ServiceName)
    .validate(name)
    .context("Invalid service name")
}

/// Container names / id prefixes.
pub fn validate_container_ref(name: &str) -> anyhow::Result<()> {
  StringValidator::default()
    .max_length(255)
    .matches(StringValidatorMatches::ContainerRef)
    .validate(name)
    .context("Invalid container reference")
}

/// Image references (`registry/repo:tag`).
pub fn validate_image_ref(name: &str) -> anyhow::Result<()> {
  StringValidator::default()
    .max_length(255)
    .matches(StringValidatorMatches::ImageRef)
    .validate(name)
    .context("Invalid image reference")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn command_allow_list_accepts_listed_program() {
    let tokens = validate_command("ls -la /tmp").unwrap();
    assert_eq!(tokens, vec!["ls", "-la", "/tmp"]);
  }

  #[test]
  fn command_rejects_unlisted_program() {
    assert!(validate_command("rm -rf /").is_err());
  }

  #[test]
  fn command_rejects_empty() {
    assert!(validate_command("").is_err());
    assert!(validate_command("   ").is_err());
  }

  #[test]
  fn command_rejects_shell_metacharacters() {
    for cmd in [
      "ls; rm -rf /",
      "ls | grep foo",
      "ls & whoami",
      "echo `id`",
      "echo $HOME",
      "cat < /etc/shadow",
      "ls > /tmp/out",
    ] {
      let e = validate_command(cmd).unwrap_err();
      assert!(
        format!("{e:#}").contains("disallowed character"),
        "expected metacharacter rejection for {cmd}, got {e:#}"
      );
    }
  }

  #[test]
  fn args_reject_metacharacters_and_length() {
    assert!(validate_args(&["-la".to_string()]).is_ok());
    assert!(validate_args(&["a;b".to_string()]).is_err());
    assert!(validate_args(&["a\nb".to_string()]).is_err());
    assert!(validate_args(&["a\0b".to_string()]).is_err());
    assert!(validate_args(&["x".repeat(501)]).is_err());
    assert!(validate_args(&["x".repeat(500)]).is_ok());
  }

  #[test]
  fn secure_path_requires_absolute() {
    assert!(validate_secure_path("relative/path").is_err());
    assert!(validate_secure_path("").is_err());
  }

  #[test]
  fn secure_path_rejects_traversal() {
    assert!(validate_secure_path("/etc/../root").is_err());
    assert!(validate_secure_path("/etc/./passwd").is_err());
    assert!(validate_secure_path("/..").is_err());
  }

  #[test]
  fn secure_path_rejects_bad_characters() {
    assert!(validate_secure_path("/tmp/a b").is_err());
    assert!(validate_secure_path("/tmp/a*b").is_err());
    assert!(validate_secure_path("/tmp/a\0b").is_err());
    assert!(validate_secure_path("/tmp/a$b").is_err());
  }

  #[test]
  fn secure_path_canonicalizes() {
    assert_eq!(
      validate_secure_path("//stacks///plex/").unwrap(),
      "/stacks/plex"
    );
    assert_eq!(
      validate_secure_path("/stacks/plex/compose.yml").unwrap(),
      "/stacks/plex/compose.yml"
    );
  }

  #[test]
  fn identifiers() {
    assert!(validate_host_name("tower-01").is_ok());
    assert!(validate_host_name("tower 01").is_err());
    assert!(validate_host_name("").is_err());

    assert!(validate_project_name("plex").is_ok());
    assert!(validate_project_name(".plex").is_err());
    assert!(validate_project_name("plex media").is_err());

    assert!(validate_container_ref("web-1").is_ok());
    assert!(validate_container_ref("web/1").is_err());

    assert!(validate_image_ref("ghcr.io/owner/app:1.2.3").is_ok());
    assert!(validate_image_ref("app:latest").is_ok());
    assert!(validate_image_ref(":bad").is_err());
    assert!(validate_image_ref("app latest").is_err());
  }
}
