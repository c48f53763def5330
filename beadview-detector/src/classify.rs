//! Path classification against the configured rule table.

use beadview_core::config::{Classification, PathClass};

/// Compiled form of a [`Classification`] table.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    rules: Vec<(String, bool, PathClass)>,
    default_class: PathClass,
}

impl PathClassifier {
    pub fn new(table: &Classification) -> Self {
        let rules = table
            .rules
            .iter()
            .map(|rule| {
                let whole_path = rule.pattern.contains('/');
                (rule.pattern.clone(), whole_path, rule.class)
            })
            .collect();
        Self {
            rules,
            default_class: table.default_class,
        }
    }

    /// Classify a `/`-separated path relative to the watched root.
    pub fn classify(&self, relative: &str) -> PathClass {
        let file_name = relative.rsplit('/').next().unwrap_or(relative);
        self.rules
            .iter()
            .find(|(pattern, whole_path, _)| {
                let subject = if *whole_path { relative } else { file_name };
                wildcard_match(pattern, subject)
            })
            .map(|(_, _, class)| *class)
            .unwrap_or(self.default_class)
    }
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(&Classification::default())
    }
}

/// `*` matches any (possibly empty) run of characters; everything else is
/// literal.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star_pi, star_ti)) = star {
            // Let the last star swallow one more character.
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
