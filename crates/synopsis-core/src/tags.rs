//! Tag canonicalization table.
//!
//! Maps known synonyms (`js`, `javascript`, `JavaScript`) to one canonical form.
//! The table is built once and shared read-only; lookups are case-insensitive.

use crate::config::TagConfig;
use std::collections::HashMap;

/// Built-in `synonym -> canonical` entries. Keys are lowercase.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("javascript", "JavaScript"),
    ("js", "JavaScript"),
    ("ecmascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("ts", "TypeScript"),
    ("python", "Python"),
    ("py", "Python"),
    ("golang", "Go"),
    ("go", "Go"),
    ("rust", "Rust"),
    ("rustlang", "Rust"),
    ("java", "Java"),
    ("c++", "C++"),
    ("cpp", "C++"),
    ("c#", "C#"),
    ("csharp", "C#"),
    ("f#", "F#"),
    (".net", ".NET"),
    ("dotnet", ".NET"),
    ("ruby", "Ruby"),
    ("php", "PHP"),
    ("swift", "Swift"),
    ("kotlin", "Kotlin"),
    ("react", "React"),
    ("reactjs", "React"),
    ("react.js", "React"),
    ("vue", "Vue.js"),
    ("vuejs", "Vue.js"),
    ("vue.js", "Vue.js"),
    ("node", "Node.js"),
    ("nodejs", "Node.js"),
    ("node.js", "Node.js"),
    ("k8s", "Kubernetes"),
    ("kubernetes", "Kubernetes"),
    ("docker", "Docker"),
    ("aws", "AWS"),
    ("amazon web services", "AWS"),
    ("gcp", "GCP"),
    ("google cloud", "GCP"),
    ("azure", "Azure"),
    ("postgres", "PostgreSQL"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("sql", "SQL"),
    ("db", "Database"),
    ("database", "Database"),
    ("データベース", "Database"),
    ("ai", "AI"),
    ("人工知能", "AI"),
    ("artificial intelligence", "AI"),
    ("ml", "Machine Learning"),
    ("machine learning", "Machine Learning"),
    ("機械学習", "Machine Learning"),
    ("llm", "LLM"),
    ("llms", "LLM"),
    ("大規模言語モデル", "LLM"),
    ("genai", "Generative AI"),
    ("generative ai", "Generative AI"),
    ("生成ai", "Generative AI"),
    ("security", "Security"),
    ("セキュリティ", "Security"),
    ("devops", "DevOps"),
    ("ci/cd", "CI/CD"),
    ("cicd", "CI/CD"),
    ("github", "GitHub"),
    ("git", "Git"),
    ("api", "API"),
    ("apis", "API"),
    ("ios", "iOS"),
    ("android", "Android"),
    ("linux", "Linux"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("webassembly", "WebAssembly"),
    ("wasm", "WebAssembly"),
    ("ux", "UX"),
    ("ui", "UI"),
];

/// Read-only case-insensitive tag synonym table.
#[derive(Debug, Clone)]
pub struct TagCanon {
    aliases: HashMap<String, String>,
}

impl Default for TagCanon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TagCanon {
    /// The built-in table only.
    pub fn builtin() -> Self {
        Self {
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// An empty table: every tag falls through to title-casing.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Built-in table with configured aliases layered on top.
    pub fn from_config(config: &TagConfig) -> Self {
        let mut canon = Self::builtin();
        for (synonym, canonical) in &config.aliases {
            canon.insert(synonym, canonical);
        }
        canon
    }

    pub fn insert(&mut self, synonym: &str, canonical: &str) {
        let key = synonym.trim().to_lowercase();
        if !key.is_empty() && !canonical.trim().is_empty() {
            self.aliases.insert(key, canonical.trim().to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Mapped canonical form of `tag`, if the table knows it.
    pub fn lookup(&self, tag: &str) -> Option<&str> {
        self.aliases
            .get(&tag.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Canonical form of `tag`: the mapped value, or the title-cased tag.
    pub fn canonicalize(&self, tag: &str) -> String {
        let tag = tag.trim();
        match self.lookup(tag) {
            Some(canonical) => canonical.to_string(),
            None => title_case(tag),
        }
    }
}

/// Upper-case the first letter of each all-lowercase word.
///
/// Words that already carry capitals (`iPhone`, `GraphQL`) and non-Latin
/// scripts are left alone.
fn title_case(tag: &str) -> String {
    tag.split(' ')
        .map(|word| {
            if word.chars().any(|c| c.is_uppercase()) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if first.is_ascii_lowercase() => {
                    let mut out = first.to_ascii_uppercase().to_string();
                    out.push_str(chars.as_str());
                    out
                }
                _ => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_synonyms_share_canonical_form() {
        let canon = TagCanon::builtin();
        assert_eq!(canon.canonicalize("javascript"), "JavaScript");
        assert_eq!(canon.canonicalize("JavaScript"), "JavaScript");
        assert_eq!(canon.canonicalize("JS"), "JavaScript");
        assert_eq!(canon.canonicalize("機械学習"), "Machine Learning");
        assert_eq!(canon.lookup("DotNet"), Some(".NET"));
        assert_eq!(canon.lookup("edge computing"), None);
    }

    #[test]
    fn test_unmapped_tags_are_title_cased() {
        let canon = TagCanon::builtin();
        assert_eq!(canon.canonicalize("edge computing"), "Edge Computing");
        assert_eq!(canon.canonicalize("iPhone"), "iPhone");
        assert_eq!(canon.canonicalize("量子コンピュータ"), "量子コンピュータ");
        assert_eq!(canon.canonicalize("2024"), "2024");
    }

    #[test]
    fn test_config_aliases_override_builtin() {
        let mut aliases = BTreeMap::new();
        aliases.insert("go".to_string(), "Golang".to_string());
        aliases.insert("nextjs".to_string(), "Next.js".to_string());
        let canon = TagCanon::from_config(&TagConfig { aliases });
        assert_eq!(canon.canonicalize("Go"), "Golang");
        assert_eq!(canon.canonicalize("NextJS"), "Next.js");
    }

    #[test]
    fn test_empty_table_only_title_cases() {
        let canon = TagCanon::empty();
        assert!(canon.is_empty());
        assert_eq!(canon.canonicalize("js"), "Js");
    }
}
