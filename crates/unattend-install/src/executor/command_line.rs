//! Silent command-line construction.
//!
//! Arguments are kept verbatim, quotes included: installers parse their own
//! command lines and NSIS in particular wants `/D=` unquoted and last.

use std::path::Path;

use unattend_core::InstallStrategy;

/// Installer framework, as far as the command line and payload reveal it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerFramework {
    Inno,
    Nsis,
    Msi,
    Unknown,
}

impl InstallerFramework {
    /// Guess the framework from the strategy, payload extension and flags.
    pub fn detect(strategy: InstallStrategy, payload: &Path, tokens: &[String]) -> Self {
        let is_msi = payload
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("msi"));
        if strategy == InstallStrategy::MsiPackage || is_msi {
            return Self::Msi;
        }

        let inno = ["/VERYSILENT", "/SILENT", "/SP-"];
        if tokens
            .iter()
            .any(|t| inno.iter().any(|flag| t.eq_ignore_ascii_case(flag)))
        {
            return Self::Inno;
        }
        // NSIS flags are case-sensitive.
        if tokens.iter().any(|t| t == "/S") {
            return Self::Nsis;
        }
        Self::Unknown
    }
}

/// Split a command line on whitespace outside double quotes.
///
/// Quotes stay part of the token: `/DIR="C:\Program Files\X"` is one token.
pub fn tokenize(command_line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in command_line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

pub fn quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

fn has_prefix_ignore_case(token: &str, prefix: &str) -> bool {
    token
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Replace any install-dir token with `dir` in the framework's dialect.
///
/// Returns `false` for [`InstallerFramework::Unknown`], leaving `tokens`
/// untouched.
pub fn apply_install_dir(tokens: &mut Vec<String>, framework: InstallerFramework, dir: &Path) -> bool {
    match framework {
        InstallerFramework::Inno => {
            tokens.retain(|t| !has_prefix_ignore_case(t, "/DIR="));
            tokens.push(format!("/DIR={}", quote(dir)));
        }
        InstallerFramework::Nsis => {
            tokens.retain(|t| !t.starts_with("/D="));
            // must be last and unquoted, even with spaces
            tokens.push(format!("/D={}", dir.display()));
        }
        InstallerFramework::Msi => {
            tokens.retain(|t| !has_prefix_ignore_case(t, "INSTALLDIR="));
            tokens.push(format!("INSTALLDIR={}", quote(dir)));
        }
        InstallerFramework::Unknown => return false,
    }
    true
}

/// Insert `extra` before a trailing NSIS `/D=` token, otherwise append.
pub fn insert_before_install_dir(tokens: &mut Vec<String>, extra: Vec<String>) {
    let at = match tokens.last() {
        Some(last) if last.starts_with("/D=") => tokens.len() - 1,
        _ => tokens.len(),
    };
    tokens.splice(at..at, extra);
}

/// `msiexec /i "<package>" /qn /norestart` plus the caller's properties.
pub fn msiexec_args(package: &Path, tokens: &[String]) -> Vec<String> {
    let mut args = vec![
        "/i".to_string(),
        quote(package),
        "/qn".to_string(),
        "/norestart".to_string(),
    ];
    args.extend(
        tokens
            .iter()
            .filter(|t| {
                !["/i", "/qn", "/quiet", "/norestart"]
                    .iter()
                    .any(|flag| t.eq_ignore_ascii_case(flag))
            })
            .cloned(),
    );
    args
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        tokenize(s)
    }

    #[test]
    fn test_tokenize_keeps_quoted_spans() {
        assert_eq!(
            tokens(r#"/VERYSILENT  /DIR="C:\Program Files\Game" /NORESTART"#),
            vec![
                "/VERYSILENT".to_string(),
                r#"/DIR="C:\Program Files\Game""#.to_string(),
                "/NORESTART".to_string(),
            ]
        );
        assert!(tokens("   ").is_empty());
    }

    #[test]
    fn test_detect_framework() {
        let exe = PathBuf::from("setup.exe");
        let detect = |s: &str| InstallerFramework::detect(InstallStrategy::Direct, &exe, &tokens(s));
        assert_eq!(detect("/verysilent /SUPPRESSMSGBOXES"), InstallerFramework::Inno);
        assert_eq!(detect("/SP- /NORESTART"), InstallerFramework::Inno);
        assert_eq!(detect("/S"), InstallerFramework::Nsis);
        assert_eq!(detect("/s"), InstallerFramework::Unknown);
        assert_eq!(detect("--silent"), InstallerFramework::Unknown);
        assert_eq!(
            InstallerFramework::detect(InstallStrategy::Direct, Path::new("pkg.MSI"), &[]),
            InstallerFramework::Msi
        );
    }

    #[test]
    fn test_inno_dir_replaced() {
        let mut args = tokens(r#"/VERYSILENT /DIR="C:\old""#);
        assert!(apply_install_dir(&mut args, InstallerFramework::Inno, Path::new(r"D:\Games\X")));
        assert_eq!(args, vec!["/VERYSILENT".to_string(), r#"/DIR="D:\Games\X""#.to_string()]);
    }

    #[test]
    fn test_nsis_dir_is_last_and_unquoted() {
        let mut args = tokens("/D=C:\\old /S");
        apply_install_dir(&mut args, InstallerFramework::Nsis, Path::new(r"D:\My Games\X"));
        assert_eq!(args.last().unwrap(), r"/D=D:\My Games\X");

        insert_before_install_dir(&mut args, vec!["/NCRC".to_string()]);
        assert_eq!(args, vec!["/S".to_string(), "/NCRC".to_string(), r"/D=D:\My Games\X".to_string()]);
    }

    #[test]
    fn test_unknown_framework_untouched() {
        let mut args = tokens("--quiet");
        assert!(!apply_install_dir(&mut args, InstallerFramework::Unknown, Path::new("x")));
        assert_eq!(args, vec!["--quiet".to_string()]);
    }

    #[test]
    fn test_msiexec_args_dedupe() {
        let args = msiexec_args(Path::new(r"C:\pkg.msi"), &tokens("/qn ALLUSERS=1 INSTALLDIR=\"C:\\X\""));
        assert_eq!(
            args,
            vec![
                "/i".to_string(),
                r#""C:\pkg.msi""#.to_string(),
                "/qn".to_string(),
                "/norestart".to_string(),
                "ALLUSERS=1".to_string(),
                r#"INSTALLDIR="C:\X""#.to_string(),
            ]
        );
    }
}
