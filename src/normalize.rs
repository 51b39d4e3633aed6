//! Canonical keys for schema paths.
//!
//! Every set comparison in the reference graph goes through these keys, so two
//! spellings of the same file (`../xsd/atributy/a.xsd` from a sibling folder and
//! `atributy/a.xsd` from the root) have to end up identical.

/// Root folder prefix used by the archive convention
pub const DEFAULT_ROOT_PREFIX: &str = "xsd";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNormalizer {
    root_prefix: String,
}

impl PathNormalizer {
    pub fn new(root_prefix: impl Into<String>) -> Self {
        let root_prefix = root_prefix.into().trim_matches('/').to_string();
        Self { root_prefix }
    }

    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    /// Strip leading `../` and `./` markers and the root prefix segment.
    ///
    /// Runs to a fixpoint, so `normalize(normalize(p)) == normalize(p)`.
    pub fn normalize(&self, path: &str) -> String {
        let mut current = path.replace('\\', "/");
        loop {
            let before = current.len();

            while let Some(rest) = current
                .strip_prefix("../")
                .or_else(|| current.strip_prefix("./"))
            {
                current = rest.to_string();
            }

            if !self.root_prefix.is_empty()
                && let Some(rest) = current
                    .strip_prefix(self.root_prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
            {
                current = rest.to_string();
            }

            if current.len() == before {
                return current;
            }
        }
    }

    /// Resolve `location` against the root-relative directory of the declaring
    /// document and normalize the result.
    ///
    /// `..` pops one segment; popping above the root is clamped rather than an
    /// error, which lets `../../xsd/x.xsd` land on `x.xsd`.
    pub fn resolve(&self, base_dir: &str, location: &str) -> String {
        let location = location.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();

        let joined = if location.starts_with('/') {
            location.clone()
        } else {
            format!("{}/{}", base_dir.replace('\\', "/"), location)
        };

        for segment in joined.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        self.normalize(&segments.join("/"))
    }
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_PREFIX)
    }
}

/// Normalize with the default root prefix.
pub fn normalize_path(path: &str) -> String {
    PathNormalizer::default().normalize(path)
}

/// Directory part of a root-relative key (`""` for files at the root).
pub fn parent_dir(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
