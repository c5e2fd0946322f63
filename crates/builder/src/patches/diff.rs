//! Splitting multi-file unified diffs into per-file sections

use kiln_errors::PatchError;

/// What a section does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileChange {
    Modify,
    Create,
    Delete,
}

/// The hunks for one file, ready for `diffy`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileDiff {
    /// Target path after stripping leading components
    pub path: String,
    pub change: FileChange,
    /// Normalised `---`/`+++` headers followed by the hunks
    pub text: String,
}

/// Split `diff` into per-file sections
///
/// Hunk bodies are delimited by their line counts, so trailers such as a
/// git signature after the last hunk are dropped.
pub(crate) fn split(diff: &str, strip: usize, label: &str) -> Result<Vec<FileDiff>, PatchError> {
    let invalid = |message: String| PatchError::InvalidDiff {
        patch: label.to_string(),
        message,
    };

    let lines: Vec<&str> = diff.split_inclusive('\n').collect();
    let mut sections = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !(line.starts_with("--- ") && lines.get(i + 1).is_some_and(|l| l.starts_with("+++ "))) {
            i += 1;
            continue;
        }

        let old = header_path(line);
        let new = header_path(lines[i + 1]);
        let (raw, change) = match (old, new) {
            (_, "/dev/null") => (old, FileChange::Delete),
            ("/dev/null", _) => (new, FileChange::Create),
            _ => (new, FileChange::Modify),
        };
        let path = strip_components(raw, strip).ok_or_else(|| {
            invalid(format!("cannot strip {strip} components from '{raw}'"))
        })?;

        let mut text = format!("--- a/{path}\n+++ b/{path}\n");
        i += 2;

        let mut hunks = 0;
        while let Some(header) = lines.get(i).filter(|l| l.starts_with("@@ ")) {
            let (mut old_left, mut new_left) =
                hunk_counts(header).ok_or_else(|| invalid(format!("bad hunk header '{}'", header.trim_end())))?;
            text.push_str(&terminated(header));
            i += 1;

            while old_left > 0 || new_left > 0 {
                let Some(body) = lines.get(i) else {
                    return Err(invalid(format!("hunk for {path} ends early")));
                };
                match body.as_bytes().first() {
                    Some(b' ') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                        text.push_str(&terminated(body));
                    }
                    // blank context line with its leading space trimmed
                    Some(b'\n' | b'\r') | None => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                        text.push(' ');
                        text.push_str(&terminated(body));
                    }
                    Some(b'-') => {
                        old_left = old_left.saturating_sub(1);
                        text.push_str(&terminated(body));
                    }
                    Some(b'+') => {
                        new_left = new_left.saturating_sub(1);
                        text.push_str(&terminated(body));
                    }
                    Some(b'\\') => text.push_str(&terminated(body)),
                    Some(_) => {
                        return Err(invalid(format!(
                            "unexpected line in hunk for {path}: '{}'",
                            body.trim_end()
                        )))
                    }
                }
                i += 1;
            }
            // "\ No newline at end of file" may follow the last counted line
            if lines.get(i).is_some_and(|l| l.starts_with('\\')) {
                text.push_str(&terminated(lines[i]));
                i += 1;
            }
            hunks += 1;
        }

        if hunks == 0 {
            return Err(invalid(format!("no hunks for {path}")));
        }
        sections.push(FileDiff { path, change, text });
    }

    if sections.is_empty() {
        return Err(invalid("no file headers found".to_string()));
    }
    Ok(sections)
}

fn terminated(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{line}\n")
    }
}

/// Path from a `---`/`+++` header, without any timestamp
fn header_path(line: &str) -> &str {
    let rest = line[4..].trim_end_matches(['\n', '\r']);
    rest.split('\t').next().unwrap_or(rest).trim()
}

fn strip_components(path: &str, strip: usize) -> Option<String> {
    if path == "/dev/null" {
        return None;
    }
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= strip {
        return None;
    }
    Some(parts[strip..].join("/"))
}

/// Old and new line counts from `@@ -a[,b] +c[,d] @@`
fn hunk_counts(header: &str) -> Option<(usize, usize)> {
    let mut fields = header.split_whitespace().skip(1);
    let old = fields.next()?.strip_prefix('-')?;
    let new = fields.next()?.strip_prefix('+')?;
    let count = |range: &str| -> Option<usize> {
        match range.split_once(',') {
            Some((_, n)) => n.parse().ok(),
            None => range.parse::<usize>().ok().map(|_| 1),
        }
    };
    Some((count(old)?, count(new)?))
}
