//! Keyword routing of chunks to a companion, a category and a priority.
//!
//! Each dimension is an ordered rule table: the first rule with a keyword
//! occurring in the lowercased text wins, otherwise the table's fallback
//! applies. Matching is by substring, so `process` also fires on
//! `processing`.

use crate::models::{Category, Companion, Priority};

/// Keywords that select `tag` when any of them occurs in the text.
#[derive(Debug, Clone)]
pub struct KeywordRule<T> {
    pub keywords: &'static [&'static str],
    pub tag: T,
}

impl<T> KeywordRule<T> {
    pub const fn new(keywords: &'static [&'static str], tag: T) -> Self {
        Self { keywords, tag }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Ordered rules plus the tag used when none match.
#[derive(Debug, Clone)]
pub struct RuleTable<T> {
    pub rules: Vec<KeywordRule<T>>,
    pub fallback: T,
}

impl<T: Copy> RuleTable<T> {
    pub fn new(rules: Vec<KeywordRule<T>>, fallback: T) -> Self {
        Self { rules, fallback }
    }

    /// `lowered` must already be lowercase.
    pub fn classify(&self, lowered: &str) -> T {
        self.rules
            .iter()
            .find(|rule| rule.matches(lowered))
            .map_or(self.fallback, |rule| rule.tag)
    }
}

pub const COMPANION_RULES: [KeywordRule<Companion>; 5] = [
    KeywordRule::new(&["athena", "healthcare", "medical"], Companion::Athena),
    KeywordRule::new(&["ebytech", "finance", "lending"], Companion::EbyTech),
    KeywordRule::new(&["partnertech", "crm", "automation"], Companion::PartnerTech),
    KeywordRule::new(&["svtlegal", "legal", "law"], Companion::SvtLegal),
    KeywordRule::new(&["supersal", "saintsal"], Companion::SuperSal),
];

pub const CATEGORY_RULES: [KeywordRule<Category>; 6] = [
    KeywordRule::new(&["sop", "procedure", "process"], Category::Sop),
    KeywordRule::new(&["training", "manual", "guide"], Category::Training),
    KeywordRule::new(&["marketing", "brand", "sales"], Category::Marketing),
    KeywordRule::new(&["code", "api", "technical"], Category::Technical),
    KeywordRule::new(&["legal", "contract", "terms"], Category::Legal),
    KeywordRule::new(&["hacp", "patent"], Category::Hacp),
];

pub const PRIORITY_RULES: [KeywordRule<Priority>; 3] = [
    KeywordRule::new(&["critical", "urgent", "hacp"], Priority::Critical),
    KeywordRule::new(&["important", "sop", "patent"], Priority::High),
    KeywordRule::new(&["training", "guide"], Priority::Medium),
];

/// Companion, category and priority inferred for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub companion: Companion,
    pub category: Category,
    pub priority: Priority,
}

/// Rule-table classifier over the three routing dimensions.
#[derive(Debug, Clone)]
pub struct Classifier {
    companions: RuleTable<Companion>,
    categories: RuleTable<Category>,
    priorities: RuleTable<Priority>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            companions: RuleTable::new(COMPANION_RULES.to_vec(), Companion::Universal),
            categories: RuleTable::new(CATEGORY_RULES.to_vec(), Category::Sales),
            priorities: RuleTable::new(PRIORITY_RULES.to_vec(), Priority::Low),
        }
    }
}

impl Classifier {
    pub fn new(
        companions: RuleTable<Companion>,
        categories: RuleTable<Category>,
        priorities: RuleTable<Priority>,
    ) -> Self {
        Self {
            companions,
            categories,
            priorities,
        }
    }

    pub fn detect_companion(&self, text: &str) -> Companion {
        self.companions.classify(&text.to_lowercase())
    }

    pub fn detect_category(&self, text: &str) -> Category {
        self.categories.classify(&text.to_lowercase())
    }

    pub fn determine_priority(&self, text: &str) -> Priority {
        self.priorities.classify(&text.to_lowercase())
    }

    /// All three dimensions from a single lowercase pass.
    pub fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        Classification {
            companion: self.companions.classify(&lowered),
            category: self.categories.classify(&lowered),
            priority: self.priorities.classify(&lowered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_rules() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.detect_companion("Medical billing codes for clinics"),
            Companion::Athena
        );
        assert_eq!(
            classifier.detect_companion("Lending criteria for small business"),
            Companion::EbyTech
        );
        assert_eq!(
            classifier.detect_companion("CRM automation playbook"),
            Companion::PartnerTech
        );
        assert_eq!(
            classifier.detect_companion("Law firm intake checklist"),
            Companion::SvtLegal
        );
        assert_eq!(
            classifier.detect_companion("SaintSal brand voice"),
            Companion::SuperSal
        );
    }

    #[test]
    fn test_companion_fallback_is_universal() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.detect_companion("Quarterly team offsite agenda"),
            Companion::Universal
        );
    }

    #[test]
    fn test_first_rule_wins() {
        let classifier = Classifier::default();
        // athena precedes svtlegal in table order
        assert_eq!(
            classifier.detect_companion("Healthcare legal review"),
            Companion::Athena
        );
        // sop precedes legal
        assert_eq!(
            classifier.detect_category("Legal procedure for contract review"),
            Category::Sop
        );
    }

    #[test]
    fn test_category_rules_and_fallback() {
        let classifier = Classifier::default();
        assert_eq!(classifier.detect_category("New hire TRAINING"), Category::Training);
        assert_eq!(classifier.detect_category("Brand colors"), Category::Marketing);
        assert_eq!(classifier.detect_category("REST API reference"), Category::Technical);
        assert_eq!(classifier.detect_category("Terms of service"), Category::Legal);
        assert_eq!(classifier.detect_category("HACP patent filing"), Category::Hacp);
        assert_eq!(classifier.detect_category("Pricing tiers"), Category::Sales);
    }

    #[test]
    fn test_priority_rules() {
        let classifier = Classifier::default();
        assert_eq!(classifier.determine_priority("URGENT outage"), Priority::Critical);
        assert_eq!(classifier.determine_priority("HACP overview"), Priority::Critical);
        assert_eq!(classifier.determine_priority("Important dates"), Priority::High);
        assert_eq!(classifier.determine_priority("Style guide"), Priority::Medium);
        assert_eq!(classifier.determine_priority("Lunch menu"), Priority::Low);
    }

    #[test]
    fn test_hacp_document() {
        let classification =
            Classifier::default().classify("The HACP patent covers the routing method.");
        assert_eq!(classification.category, Category::Hacp);
        assert_eq!(classification.priority, Priority::Critical);
        assert_eq!(classification.companion, Companion::Universal);
    }

    #[test]
    fn test_deterministic() {
        let classifier = Classifier::default();
        let text = "Finance SOP for loan processing";
        assert_eq!(classifier.classify(text), classifier.classify(text));
    }

    #[test]
    fn test_custom_tables() {
        let classifier = Classifier::new(
            RuleTable::new(
                vec![KeywordRule::new(&["radiology"], Companion::Athena)],
                Companion::SuperSal,
            ),
            RuleTable::new(vec![], Category::Technical),
            RuleTable::new(vec![], Priority::Medium),
        );
        assert_eq!(classifier.detect_companion("Radiology"), Companion::Athena);
        assert_eq!(classifier.detect_companion("medical"), Companion::SuperSal);
        assert_eq!(classifier.detect_category("anything"), Category::Technical);
        assert_eq!(classifier.determine_priority("critical"), Priority::Medium);
    }
}
