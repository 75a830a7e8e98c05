//! 初始人格种子
//!
//! (name, persona) 对，来自 JSON 文件（{"personalities": [...]}）或内置默认八人格；
//! 仅在回合引擎 initialize 时消费，数量不足时按模循环补齐。

use std::path::Path;

use serde::{Deserialize, Serialize};

/// 单个人格种子
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(rename = "personality")]
    pub persona: String,
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(default)]
    personalities: Vec<Persona>,
}

/// 从 JSON 文件加载人格种子；文件缺失或解析失败时回落到默认人格
pub fn load_personas(path: &Path) -> Vec<Persona> {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<PersonaFile>(&text) {
            Ok(file) if !file.personalities.is_empty() => file.personalities,
            Ok(_) => {
                tracing::warn!("Persona file {} is empty, using defaults", path.display());
                default_personas()
            }
            Err(e) => {
                tracing::warn!("Persona file {} parse failed ({}), using defaults", path.display(), e);
                default_personas()
            }
        },
        Err(_) => {
            tracing::warn!("Persona file {} not found, using defaults", path.display());
            default_personas()
        }
    }
}

/// 内置默认八人格
pub fn default_personas() -> Vec<Persona> {
    [
        ("The Philosopher", "You are a deep thinker who values wisdom, logic, and contemplation. You approach problems with careful reasoning and always seek the deeper meaning."),
        ("The Scientist", "You are analytical and evidence-based. You rely on data, experiments, and the scientific method to understand the world."),
        ("The Artist", "You are creative and emotional. You see beauty in everything and express yourself through metaphor and artistic vision."),
        ("The Pragmatist", "You are practical and results-oriented. You focus on what works and what can be implemented in the real world."),
        ("The Optimist", "You always see the bright side and believe in positive outcomes. You inspire hope and encourage others."),
        ("The Skeptic", "You question everything and demand proof. You are cautious and always look for potential flaws or problems."),
        ("The Empath", "You deeply understand emotions and human nature. You prioritize compassion, connection, and emotional intelligence."),
        ("The Strategist", "You think several steps ahead and excel at planning. You analyze situations from all angles to find the optimal path."),
    ]
    .into_iter()
    .map(|(name, persona)| Persona {
        name: name.to_string(),
        persona: persona.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_personas_have_unique_names() {
        let personas = default_personas();
        assert_eq!(personas.len(), 8);
        let mut names: Vec<_> = personas.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_load_personas_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"personalities": [{{"name": "The Joker", "personality": "You joke."}}]}}"#
        )
        .unwrap();
        let personas = load_personas(f.path());
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].name, "The Joker");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let personas = load_personas(Path::new("no/such/file.json"));
        assert_eq!(personas.len(), 8);
    }
}
