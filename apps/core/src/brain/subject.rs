//! Subject tagging for NEET/JEE questions.
//!
//! Keyword heuristic mapping a question to one of the exam subjects. The tag
//! is stored on the solution and drives the progress analytics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// An exam subject tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Physics,
    Chemistry,
    Biology,
    Mathematics,
    /// No subject vocabulary matched (greetings, study advice, etc.).
    General,
}

impl Subject {
    pub fn label(&self) -> &'static str {
        match self {
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::Mathematics => "mathematics",
            Subject::General => "general",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

struct SubjectPattern {
    subject: Subject,
    patterns: Vec<Regex>,
}

static PHYSICS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(velocity|acceleration|momentum|force|torque|friction|gravity|gravitation)\b")
            .expect("Invalid regex: mechanics terms"),
        Regex::new(r"(?i)\b(current|voltage|resistance|circuit|capacitor|inductor|magnetic|electric field)\b")
            .expect("Invalid regex: electricity terms"),
        Regex::new(r"(?i)\b(optics|lens|mirror|refraction|diffraction|interference|photon|wavelength)\b")
            .expect("Invalid regex: optics terms"),
        Regex::new(r"(?i)\b(thermodynamics|entropy|heat engine|kinetic energy|projectile|newton)\b")
            .expect("Invalid regex: thermo and mechanics terms"),
    ]
});

static CHEMISTRY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(reaction|mechanism|compound|molecule|mole|molar|valency|oxidation|reduction)\b")
            .expect("Invalid regex: general chemistry terms"),
        Regex::new(r"(?i)\b(acid|base|salt|ph|buffer|titration|electrolysis|equilibrium constant)\b")
            .expect("Invalid regex: physical chemistry terms"),
        Regex::new(r"(?i)\b(alkane|alkene|alkyne|benzene|isomer|polymer|aldehyde|ketone|ester|sn1|sn2)\b")
            .expect("Invalid regex: organic chemistry terms"),
        Regex::new(r"(?i)\b(periodic table|electronegativity|ionization|hybridi[sz]ation|orbital)\b")
            .expect("Invalid regex: inorganic chemistry terms"),
    ]
});

static BIOLOGY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(cell|tissue|organ|enzyme|protein|dna|rna|gene|chromosome|genetics)\b")
            .expect("Invalid regex: cell biology terms"),
        Regex::new(r"(?i)\b(photosynthesis|respiration|mitosis|meiosis|osmosis|diffusion)\b")
            .expect("Invalid regex: process terms"),
        Regex::new(r"(?i)\b(plant|animal|species|ecosystem|evolution|taxonomy|kingdom)\b")
            .expect("Invalid regex: ecology terms"),
        Regex::new(r"(?i)\b(heart|blood|neuron|hormone|kidney|digestion|immunity)\b")
            .expect("Invalid regex: physiology terms"),
    ]
});

static MATHEMATICS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(integrate|integral|derivative|differentiate|limit|continuity|calculus)\b")
            .expect("Invalid regex: calculus terms"),
        Regex::new(r"(?i)\b(matrix|determinant|vector space|polynomial|quadratic|logarithm)\b")
            .expect("Invalid regex: algebra terms"),
        Regex::new(r"(?i)\b(probability|permutation|combination|binomial|statistics)\b")
            .expect("Invalid regex: probability terms"),
        Regex::new(r"(?i)\b(triangle|circle|ellipse|parabola|trigonometry|sin|cos|tan|geometry)\b")
            .expect("Invalid regex: geometry terms"),
        Regex::new(r"[∫∑√π]").expect("Invalid regex: maths symbols"),
    ]
});

/// Tags a question with the subject whose vocabulary matches most.
pub struct SubjectTagger {
    patterns: Vec<SubjectPattern>,
}

impl Default for SubjectTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl SubjectTagger {
    pub fn new() -> Self {
        let patterns = vec![
            SubjectPattern {
                subject: Subject::Physics,
                patterns: PHYSICS_PATTERNS.clone(),
            },
            SubjectPattern {
                subject: Subject::Chemistry,
                patterns: CHEMISTRY_PATTERNS.clone(),
            },
            SubjectPattern {
                subject: Subject::Biology,
                patterns: BIOLOGY_PATTERNS.clone(),
            },
            SubjectPattern {
                subject: Subject::Mathematics,
                patterns: MATHEMATICS_PATTERNS.clone(),
            },
        ];

        Self { patterns }
    }

    /// Returns the subject with the highest pattern-match count, `General`
    /// when nothing matches. Ties keep the earlier subject in NEET/JEE
    /// ordering (physics, chemistry, biology, mathematics).
    pub fn tag(&self, text: &str) -> Subject {
        let mut best = Subject::General;
        let mut best_count = 0usize;

        for group in &self.patterns {
            let count = group.patterns.iter().filter(|p| p.is_match(text)).count();
            if count > best_count {
                best_count = count;
                best = group.subject;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mathematics_tagging() {
        let tagger = SubjectTagger::new();
        assert_eq!(tagger.tag("Solve: ∫ x²dx from 0 to 5"), Subject::Mathematics);
        assert_eq!(
            tagger.tag("Find the determinant of this matrix"),
            Subject::Mathematics
        );
    }

    #[test]
    fn test_chemistry_tagging() {
        let tagger = SubjectTagger::new();
        assert_eq!(
            tagger.tag("Explain the SN1 reaction mechanism"),
            Subject::Chemistry
        );
    }

    #[test]
    fn test_physics_tagging() {
        let tagger = SubjectTagger::new();
        assert_eq!(
            tagger.tag("A projectile is launched with velocity 20 m/s"),
            Subject::Physics
        );
    }

    #[test]
    fn test_biology_tagging() {
        let tagger = SubjectTagger::new();
        assert_eq!(
            tagger.tag("Describe the stages of mitosis in a plant cell"),
            Subject::Biology
        );
    }

    #[test]
    fn test_general_fallback() {
        let tagger = SubjectTagger::new();
        assert_eq!(tagger.tag("hello there"), Subject::General);
        assert_eq!(tagger.tag(""), Subject::General);
    }
}
