//! Run configuration and tsconfig.json loading.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// File name looked up in the working directory when no tsconfig is given.
pub const DEFAULT_TSCONFIG: &str = "tsconfig.json";

/// Switches that control which inferred types are written back.
///
/// Fixed for the whole run; there is no per-file or per-node override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Annotate variables even when their inferred type is a literal type.
    pub include_literal_types: bool,
    /// Never write an annotation whose inferred type is exactly `any`.
    pub ignore_any_type: bool,
}

/// Everything a run needs, with the working directory made explicit.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory the glob pattern and the default tsconfig are resolved against.
    pub cwd: PathBuf,
    /// Glob pattern selecting the files to annotate.
    pub pattern: String,
    /// Explicitly requested tsconfig; must exist when given.
    pub tsconfig: Option<PathBuf>,
    /// Annotation filters.
    pub config: RunConfig,
}

/// Checker settings derived from `compilerOptions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckerOptions {
    /// `null` and `undefined` are distinct types rather than members of every type.
    pub strict_null_checks: bool,
}

/// The subset of tsconfig.json the tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    /// Base configurations this one extends, applied left to right.
    #[serde(default, deserialize_with = "string_or_list")]
    pub extends: Vec<String>,
    /// Compiler options.
    #[serde(default)]
    pub compiler_options: Option<CompilerOptions>,
}

/// Compiler options that influence inferred types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Umbrella `strict` flag.
    #[serde(default, deserialize_with = "bool_or_string")]
    pub strict: Option<bool>,
    /// Explicit `strictNullChecks`, overrides `strict`.
    #[serde(default, deserialize_with = "bool_or_string")]
    pub strict_null_checks: Option<bool>,
}

impl TsConfig {
    /// Derives the checker settings, applying TypeScript's defaults.
    pub fn checker_options(&self) -> CheckerOptions {
        let options = self.compiler_options.clone().unwrap_or_default();
        CheckerOptions {
            strict_null_checks: options
                .strict_null_checks
                .or(options.strict)
                .unwrap_or(false),
        }
    }

    fn merge(base: TsConfig, child: TsConfig) -> TsConfig {
        let compiler_options = match (base.compiler_options, child.compiler_options) {
            (Some(base), Some(child)) => Some(CompilerOptions {
                strict: child.strict.or(base.strict),
                strict_null_checks: child.strict_null_checks.or(base.strict_null_checks),
            }),
            (base, child) => child.or(base),
        };
        TsConfig { extends: Vec::new(), compiler_options }
    }
}

/// Accepts `true` as well as `"true"` for boolean options.
fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(D::Error::custom(format!("invalid boolean value: '{}'", s))),
        },
    }
}

/// Accepts `"./base"` as well as `["./a", "./b"]` for `extends`.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }

    match Option::<StringOrList>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(StringOrList::String(s)) => Ok(vec![s]),
        Some(StringOrList::List(list)) => Ok(list),
    }
}

/// Picks the tsconfig for a run.
///
/// An explicit path is resolved against `cwd` and must exist. Without one,
/// `tsconfig.json` in `cwd` is used when present.
pub fn resolve_tsconfig(cwd: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let path = cwd.join(path);
            if path.is_file() {
                Ok(Some(path))
            } else {
                Err(Error::config_error(format!(
                    "Specified tsconfig file not found: {}",
                    path.display()
                )))
            }
        },
        None => {
            let path = cwd.join(DEFAULT_TSCONFIG);
            Ok(path.is_file().then_some(path))
        },
    }
}

/// Parses tsconfig text, tolerating comments and trailing commas.
pub fn parse_tsconfig(source: &str) -> Result<TsConfig> {
    let json = strip_jsonc(source);
    serde_json::from_str(&json)
        .map_err(|e| Error::config_error(format!("failed to parse tsconfig JSON: {}", e)))
}

/// Loads a tsconfig and everything it `extends`.
pub fn load_tsconfig(path: &Path) -> Result<TsConfig> {
    let mut visited = HashSet::new();
    load_tsconfig_inner(path, &mut visited)
}

fn load_tsconfig_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<TsConfig> {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        return Err(Error::config_error(format!(
            "tsconfig extends cycle detected at {}",
            canonical.display()
        )));
    }

    let source = std::fs::read_to_string(path).map_err(|e| {
        Error::config_error(format!("failed to read tsconfig {}: {}", path.display(), e))
    })?;
    let mut config = parse_tsconfig(&source).map_err(|e| {
        Error::config_error(format!("{} ({})", e, path.display()))
    })?;

    let mut base: Option<TsConfig> = None;
    for extends in std::mem::take(&mut config.extends) {
        match resolve_extends(path, &extends)? {
            Some(base_path) => {
                let loaded = load_tsconfig_inner(&base_path, visited)?;
                base = Some(match base {
                    Some(earlier) => TsConfig::merge(earlier, loaded),
                    None => loaded,
                });
            },
            None => log::warn!(
                "{}: cannot resolve extended config `{}`, ignoring it",
                path.display(),
                extends
            ),
        }
    }
    if let Some(base) = base {
        config = TsConfig::merge(base, config);
    }

    visited.remove(&canonical);
    Ok(config)
}

fn resolve_extends(current: &Path, extends: &str) -> Result<Option<PathBuf>> {
    let base_dir = current.parent().ok_or_else(|| {
        Error::config_error(format!("tsconfig has no parent directory: {}", current.display()))
    })?;

    let is_relative = extends.starts_with("./") || extends.starts_with("../");
    if is_relative || Path::new(extends).is_absolute() {
        let mut candidate = base_dir.join(extends);
        if candidate.extension().is_none() {
            candidate.set_extension("json");
        }
        return Ok(Some(candidate));
    }

    // Package reference, e.g. `@tsconfig/node18/tsconfig.json`.
    let package = base_dir.join("node_modules").join(extends);
    let candidates = [
        package.clone(),
        package.with_extension("json"),
        package.join(DEFAULT_TSCONFIG),
    ];
    Ok(candidates.into_iter().find(|c| c.is_file()))
}

/// Removes `//` and `/* */` comments and trailing commas outside strings.
fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            match ch {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                },
                '"' => in_string = false,
                _ => {},
            }
            continue;
        }

        match (ch, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
            },
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            },
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    prev = c;
                }
            },
            (',', _) => {
                // Dropped when only whitespace separates it from a closing bracket.
                let rest = chars.clone().skip_while(|c| c.is_whitespace()).next();
                if !matches!(rest, Some('}') | Some(']')) {
                    out.push(ch);
                }
            },
            _ => out.push(ch),
        }
    }

    out
}
