//! Input validation applied before anything reaches a process spawn.
//!
//! Every check is a pure function returning a [`Verdict`]; the only I/O is a
//! read-only existence check on source paths. Rejection is terminal: callers
//! turn it into [`Error::Validation`](crate::Error::Validation) with
//! [`Verdict::into_result`] and never retry with the same input.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};

/// Characters refused inside any single argument. Arguments are passed as an
/// argv array and never through a shell; `;` stays allowed because filter
/// graphs use it.
pub const SHELL_METACHARACTERS: &[char] = &['&', '|', '`', '$'];

/// Outcome of a validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

impl Verdict {
    fn reject(reason: impl Into<String>) -> Self {
        Verdict::Rejected(reason.into())
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Convert into a `Result`, prefixing the rejection reason with `context`.
    pub fn into_result(self, context: &str) -> Result<()> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(reason) => Err(Error::Validation(format!("{context}: {reason}"))),
        }
    }
}

/// Options for [`validate_destination_path`].
#[derive(Debug, Clone)]
pub struct DestinationOptions {
    /// Accept anything whose parent lies inside the temp directory.
    pub allow_temp: bool,
    /// Allowed extensions, with or without the leading dot. `None` allows any.
    pub allowed_extensions: Option<Vec<String>>,
}

impl Default for DestinationOptions {
    fn default() -> Self {
        Self {
            allow_temp: true,
            allowed_extensions: None,
        }
    }
}

impl DestinationOptions {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }
}

/// Validate a path that a tool will read from.
///
/// Rejects empty or non-UTF-8 paths, any `..` segment, paths whose resolved
/// form differs from the resolution of their normalized form, and paths that
/// do not exist.
pub fn validate_source_path(path: impl AsRef<Path>) -> Verdict {
    let path = path.as_ref();
    let resolved = match resolve_checked(path) {
        Ok(resolved) => resolved,
        Err(verdict) => return verdict,
    };

    if !resolved.exists() {
        tracing::warn!(path = %resolved.display(), "Validation: file does not exist");
        return Verdict::reject(format!("file does not exist: {}", resolved.display()));
    }

    Verdict::Accepted
}

/// Validate a path that a tool (or the finalizer) will write to.
pub fn validate_destination_path(path: impl AsRef<Path>, options: &DestinationOptions) -> Verdict {
    let path = path.as_ref();
    let resolved = match resolve_checked(path) {
        Ok(resolved) => resolved,
        Err(verdict) => return verdict,
    };

    if let Some(allowed) = options.allowed_extensions.as_ref().filter(|a| !a.is_empty()) {
        let ext = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let permitted = allowed
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext));
        if !permitted {
            tracing::warn!(extension = %ext, ?allowed, "Validation: invalid file extension");
            return Verdict::reject(format!(
                "extension '.{ext}' is not one of {}",
                allowed.join(", ")
            ));
        }
    }

    let parent = resolved.parent().unwrap_or(&resolved);

    if options.allow_temp && is_in_temp_dir(parent) {
        return Verdict::Accepted;
    }

    for system_dir in system_dirs() {
        if parent.starts_with(&system_dir) {
            tracing::warn!(
                path = %resolved.display(),
                "Security: attempt to write to system directory"
            );
            return Verdict::reject(format!(
                "refusing to write inside system directory {}",
                system_dir.display()
            ));
        }
    }

    Verdict::Accepted
}

/// Validate the arguments a pipeline stage contributes to a tool invocation.
///
/// The element type already guarantees a sequence of strings.
pub fn validate_argument_vector<S: AsRef<str>>(args: &[S]) -> Verdict {
    for arg in args {
        let arg = arg.as_ref();
        if let Some(c) = arg.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            tracing::warn!(arg, "Security: suspicious shell metacharacter in args");
            return Verdict::reject(format!("argument {arg:?} contains '{c}'"));
        }
    }
    Verdict::Accepted
}

/// Validate that an untyped settings value is a plain JSON object.
pub fn validate_option_bag(value: &Value) -> Verdict {
    let kind = match value {
        Value::Object(_) => return Verdict::Accepted,
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    tracing::warn!("Validation: settings must be a plain object, got {kind}");
    Verdict::reject(format!("settings must be a JSON object, got {kind}"))
}

/// Shared traversal and resolution checks. Returns the resolved absolute
/// path on success.
fn resolve_checked(path: &Path) -> std::result::Result<PathBuf, Verdict> {
    let Some(raw) = path.to_str() else {
        return Err(Verdict::reject("path is not valid UTF-8"));
    };
    if raw.is_empty() {
        return Err(Verdict::reject("path is empty"));
    }
    if raw.contains('\0') {
        return Err(Verdict::reject("path contains a NUL byte"));
    }

    // Both separators, so a Windows-style `..\` is caught on every platform.
    let traverses = raw.split(['/', '\\']).any(|segment| segment == "..")
        || path.components().any(|c| matches!(c, Component::ParentDir));
    if traverses {
        tracing::warn!(path = raw, "Security: directory traversal attempt blocked");
        return Err(Verdict::reject(format!("directory traversal in {raw:?}")));
    }

    let resolved = resolve(path).map_err(|e| Verdict::reject(format!("cannot resolve: {e}")))?;
    let renormalized = resolve(&normalize(path))
        .map_err(|e| Verdict::reject(format!("cannot resolve: {e}")))?;
    if resolved != renormalized {
        tracing::warn!(path = raw, "Security: path resolution mismatch");
        return Err(Verdict::reject(format!("path resolution mismatch for {raw:?}")));
    }

    Ok(resolved)
}

/// Make a path absolute against the working directory, then normalize it.
fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Lexically normalize a path: drop `.` components and fold `..` into its
/// parent. No filesystem access.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn is_in_temp_dir(dir: &Path) -> bool {
    let tmp = std::env::temp_dir();
    if dir.starts_with(&tmp) {
        return true;
    }
    // macOS exposes the temp dir through a symlink (/var -> /private/var).
    match (tmp.canonicalize(), dir.canonicalize()) {
        (Ok(tmp), Ok(dir)) => dir.starts_with(tmp),
        _ => false,
    }
}

fn system_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    #[cfg(windows)]
    {
        let env_or = |key: &str, fallback: &str| {
            PathBuf::from(std::env::var(key).unwrap_or_else(|_| fallback.to_string()))
        };
        dirs.push(env_or("SystemRoot", r"C:\Windows"));
        dirs.push(env_or("ProgramFiles", r"C:\Program Files"));
        dirs.push(env_or("ProgramFiles(x86)", r"C:\Program Files (x86)"));
    }

    dirs.extend(
        ["/System", "/bin", "/sbin", "/usr/bin", "/usr/sbin"]
            .iter()
            .map(PathBuf::from),
    );
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_rejects_relative_traversal() {
        let verdict = validate_source_path("../../etc/passwd");
        assert!(!verdict.is_accepted());
    }

    #[test]
    fn traversal_is_rejected_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("clip.gif");
        std::fs::write(&real, b"GIF89a").unwrap();
        let sneaky = format!("{}/sub/../clip.gif", dir.path().display());

        let cases = [
            "../../etc/passwd",
            "..",
            "a/../b.gif",
            "/tmp/../etc/shadow",
            r"C:\Users\..\Windows\evil.gif",
            sneaky.as_str(),
        ];
        for case in cases {
            assert!(
                !validate_source_path(case).is_accepted(),
                "source accepted {case}"
            );
            assert!(
                !validate_destination_path(case, &DestinationOptions::default()).is_accepted(),
                "destination accepted {case}"
            );
        }
    }

    #[test]
    fn double_dot_inside_a_name_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("final..cut.gif");
        std::fs::write(&file, b"GIF89a").unwrap();
        assert_eq!(validate_source_path(&file), Verdict::Accepted);
    }

    #[test]
    fn source_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        assert!(!validate_source_path(&missing).is_accepted());

        std::fs::write(&missing, b"data").unwrap();
        assert_eq!(validate_source_path(&missing), Verdict::Accepted);
    }

    #[test]
    fn source_rejects_empty_and_nul() {
        assert!(!validate_source_path("").is_accepted());
        assert!(!validate_source_path("clip\0.gif").is_accepted());
    }

    #[test]
    fn source_verdict_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"png").unwrap();
        let missing = dir.path().join("b.png");
        for path in [file.as_path(), missing.as_path(), Path::new("../x")] {
            assert_eq!(validate_source_path(path), validate_source_path(path));
        }
    }

    #[test]
    fn destination_in_temp_is_accepted() {
        let path = std::env::temp_dir().join("DeskGif_1_abc.gif");
        assert_eq!(
            validate_destination_path(&path, &DestinationOptions::default()),
            Verdict::Accepted
        );
    }

    #[test]
    fn destination_need_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.gif");
        assert!(validate_destination_path(&path, &DestinationOptions::default()).is_accepted());
    }

    #[cfg(unix)]
    #[test]
    fn destination_in_system_dir_is_rejected() {
        for path in ["/usr/bin/evil.gif", "/bin/sh2", "/sbin/x.png", "/System/Library/a.gif"] {
            assert!(
                !validate_destination_path(path, &DestinationOptions::default()).is_accepted(),
                "accepted {path}"
            );
        }
        // Prefix match is per component.
        assert!(
            validate_destination_path("/binaries/out.gif", &DestinationOptions::default())
                .is_accepted()
        );
    }

    #[test]
    fn destination_extension_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let opts = DestinationOptions::default().with_extensions(["gif", ".PNG"]);

        assert!(validate_destination_path(dir.path().join("a.GIF"), &opts).is_accepted());
        assert!(validate_destination_path(dir.path().join("a.png"), &opts).is_accepted());
        assert!(!validate_destination_path(dir.path().join("a.mp4"), &opts).is_accepted());
        assert!(!validate_destination_path(dir.path().join("noext"), &opts).is_accepted());
    }

    #[test]
    fn extension_checked_even_in_temp() {
        let opts = DestinationOptions::default().with_extensions(["gif"]);
        let path = std::env::temp_dir().join("DeskGif_x.exe");
        assert!(!validate_destination_path(&path, &opts).is_accepted());
    }

    #[test]
    fn argument_vector_rejects_metacharacters() {
        let verdict = validate_argument_vector(&["-i", "in.mp4", "&& rm -rf /"]);
        assert_matches_rejected(&verdict, '&');

        for bad in ["a|b", "`id`", "$HOME", "$(id)"] {
            assert!(!validate_argument_vector(&[bad]).is_accepted(), "{bad}");
        }
    }

    #[test]
    fn argument_vector_allows_filter_graphs() {
        let args = [
            "-filter_complex",
            "[0:v]fps=15,scale=800:-1:flags=lanczos[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=5",
            "select='not(mod(n,2))'",
            "#-1-0",
        ];
        assert_eq!(validate_argument_vector(&args), Verdict::Accepted);
        assert_eq!(validate_argument_vector::<&str>(&[]), Verdict::Accepted);
    }

    #[test]
    fn option_bag_must_be_object() {
        assert!(validate_option_bag(&json!({"fps": 15})).is_accepted());
        assert!(validate_option_bag(&json!({})).is_accepted());
        assert!(!validate_option_bag(&json!([1, 2])).is_accepted());
        assert!(!validate_option_bag(&json!(null)).is_accepted());
        assert!(!validate_option_bag(&json!("fps=15")).is_accepted());
    }

    #[test]
    fn into_result_maps_to_validation_error() {
        let err = validate_option_bag(&json!([]))
            .into_result("Invalid settings object provided")
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.starts_with("Invalid settings")));
    }

    #[test]
    fn normalize_folds_components() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/./b")), PathBuf::from("a/b"));
    }

    fn assert_matches_rejected(verdict: &Verdict, c: char) {
        match verdict {
            Verdict::Rejected(reason) => assert!(reason.contains(c), "reason: {reason}"),
            Verdict::Accepted => panic!("expected rejection"),
        }
    }
}
