//! Fixed vocabularies that connect questionnaire answers to the words
//! therapists use in their own profiles.

use serde_json::{Map, Value};

use crate::models::{ApproachPreference, CommunicationStyle, ReligiousPreference};

/// User-facing concern categories and the specialties that satisfy them
pub const CONCERN_GROUPS: &[(&str, &[&str])] = &[
    (
        "Anxiety",
        &["Anxiety", "Anxiety Disorders", "OCD", "Panic", "Social Anxiety", "Stress"],
    ),
    ("Depression", &["Depression", "Mood Disorders", "Bipolar"]),
    (
        "Trauma/PTSD",
        &[
            "Trauma",
            "PTSD",
            "Complex Trauma",
            "EMDR",
            "Sexual Assault",
            "Domestic Violence",
            "Intergenerational Trauma",
        ],
    ),
    ("Grief & Loss", &["Grief", "Loss", "Bereavement"]),
    (
        "Relationship Issues",
        &["Relationship", "Couples", "Marriage", "Dating", "Intimacy", "Communication"],
    ),
    (
        "Family Issues",
        &["Family", "Parenting", "Family Conflict", "Family Expectations", "Family Dynamics"],
    ),
    (
        "Cultural Identity",
        &[
            "Cultural Identity",
            "Identity",
            "Multicultural",
            "Immigration",
            "Acculturation",
            "Biracial",
            "Multiracial",
        ],
    ),
    (
        "Racial Trauma",
        &["Racial Trauma", "Black Mental Health", "Racism", "Discrimination", "Microaggressions"],
    ),
    (
        "LGBTQ+ Identity",
        &["LGBTQ+", "Gender Identity", "Coming Out", "Trans", "Queer", "Sexual Identity"],
    ),
    (
        "Self-Esteem",
        &["Self-Esteem", "Self-Worth", "Confidence", "Imposter Syndrome", "Perfectionism"],
    ),
    (
        "Life Transitions",
        &["Life Transitions", "Career", "College", "Divorce", "Retirement", "Moving"],
    ),
    (
        "Stress & Burnout",
        &["Stress", "Burnout", "Work Stress", "Work-Life Balance", "Overwhelm"],
    ),
];

const PRACTICAL: &[&str] = &[
    "CBT",
    "DBT",
    "Solution-Focused",
    "Skills",
    "Coaching",
    "Behavioral",
    "Practical",
];
const INSIGHT: &[&str] = &["Psychodynamic", "Insight", "Narrative", "Exploratory", "Depth", "Reflective"];
const TRAUMA: &[&str] = &["EMDR", "Trauma", "Somatic", "IFS", "Trauma-Informed", "Trauma-Focused"];
const BALANCED: &[&str] = &["Integrative", "Holistic", "Eclectic", "Comprehensive"];

const DIRECT: &[&str] = &[
    "direct",
    "straightforward",
    "solution-focused",
    "practical",
    "goal-oriented",
    "structured",
];
const WARM: &[&str] = &["warm", "gentle", "compassionate", "empathetic", "nurturing", "supportive"];
const COLLABORATIVE: &[&str] = &["collaborative", "partnership", "interactive", "team", "together"];

/// Terms that signal cultural, ethnic, religious or migration experience
pub const CULTURAL_SIGNAL_TERMS: &[&str] = &[
    // Ethnicity and heritage
    "South Asian",
    "East Asian",
    "Southeast Asian",
    "Asian American",
    "AAPI",
    "Black",
    "African American",
    "Caribbean",
    "Latinx",
    "Latino",
    "Latina",
    "Hispanic",
    "Indigenous",
    "Native American",
    "Middle Eastern",
    "Arab",
    "Persian",
    "Filipino",
    "Korean",
    "Chinese",
    "Vietnamese",
    "Indian",
    "Pakistani",
    "BIPOC",
    "POC",
    "People of Color",
    // Religion
    "Hindu",
    "Muslim",
    "Jewish",
    "Sikh",
    "Buddhist",
    "Christian",
    "Catholic",
    // Migration
    "Immigrant",
    "Immigrants",
    "Immigration",
    "Refugee",
    "First-Generation",
    "Second-Generation",
    "Bicultural",
    "Acculturation",
    "Diaspora",
    // Cultural practice
    "Culturally-Informed",
    "Culturally Informed",
    "Culturally Responsive",
    "Multicultural",
    "Cross-Cultural",
    "Cultural Identity",
    "Intergenerational",
];

/// Specialty keywords for a concern; unknown concerns match themselves
pub fn specialty_keywords(concern: &str) -> Vec<&str> {
    CONCERN_GROUPS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(concern.trim()))
        .map(|(_, keywords)| keywords.to_vec())
        .unwrap_or_else(|| vec![concern.trim()])
}

/// Modality keywords for an approach preference
pub fn approach_keywords(preference: ApproachPreference) -> &'static [&'static str] {
    match preference {
        ApproachPreference::Practical => PRACTICAL,
        ApproachPreference::Insight => INSIGHT,
        ApproachPreference::Trauma => TRAUMA,
        ApproachPreference::Both => BALANCED,
        ApproachPreference::Unsure | ApproachPreference::Unspecified => &[],
    }
}

/// Plain-English label used in match reasons
pub fn approach_label(preference: ApproachPreference) -> &'static str {
    match preference {
        ApproachPreference::Practical => "a practical, skills-based approach",
        ApproachPreference::Insight => "an insight-oriented approach",
        ApproachPreference::Trauma => "a trauma-focused approach",
        ApproachPreference::Both => "a balanced, integrative approach",
        ApproachPreference::Unsure | ApproachPreference::Unspecified => "your preferred approach",
    }
}

/// Narrative tone keywords for a communication style
pub fn style_keywords(style: CommunicationStyle) -> &'static [&'static str] {
    match style {
        CommunicationStyle::Direct => DIRECT,
        CommunicationStyle::Warm => WARM,
        CommunicationStyle::Collaborative => COLLABORATIVE,
        CommunicationStyle::NoPreference | CommunicationStyle::Unspecified => &[],
    }
}

/// Faith-aligned keywords; empty for secular or no preference
pub fn faith_keywords(preference: ReligiousPreference) -> &'static [&'static str] {
    match preference {
        ReligiousPreference::Christian => &["Christian", "Christ-centered", "Faith-Based", "Biblical"],
        ReligiousPreference::Catholic => &["Catholic", "Christian", "Faith-Based"],
        ReligiousPreference::Jewish => &["Jewish", "Judaism"],
        ReligiousPreference::Muslim => &["Muslim", "Islamic", "Islam"],
        ReligiousPreference::Hindu => &["Hindu", "Hinduism", "Vedic"],
        ReligiousPreference::Buddhist => &["Buddhist", "Buddhism"],
        ReligiousPreference::Spiritual => &["Spiritual", "Spirituality", "Faith-Based"],
        ReligiousPreference::Secular
        | ReligiousPreference::NoPreference
        | ReligiousPreference::Unspecified => &[],
    }
}

pub fn faith_label(preference: ReligiousPreference) -> &'static str {
    match preference {
        ReligiousPreference::Christian => "Christian",
        ReligiousPreference::Catholic => "Catholic",
        ReligiousPreference::Jewish => "Jewish",
        ReligiousPreference::Muslim => "Muslim",
        ReligiousPreference::Hindu => "Hindu",
        ReligiousPreference::Buddhist => "Buddhist",
        ReligiousPreference::Spiritual => "spiritual",
        ReligiousPreference::Secular
        | ReligiousPreference::NoPreference
        | ReligiousPreference::Unspecified => "",
    }
}

fn groups_to_json<'a>(groups: impl IntoIterator<Item = (&'a str, &'a [&'a str])>) -> Value {
    let map: Map<String, Value> = groups
        .into_iter()
        .map(|(name, keywords)| {
            let keywords = keywords.iter().map(|k| Value::String(k.to_string())).collect();
            (name.to_string(), Value::Array(keywords))
        })
        .collect();
    Value::Object(map)
}

/// The full taxonomy as JSON, for handing to a remote ranking delegate
pub fn to_json() -> Value {
    let approaches = [
        ApproachPreference::Practical,
        ApproachPreference::Insight,
        ApproachPreference::Trauma,
        ApproachPreference::Both,
    ];
    let styles = [
        CommunicationStyle::Direct,
        CommunicationStyle::Warm,
        CommunicationStyle::Collaborative,
    ];

    serde_json::json!({
        "concerns": groups_to_json(CONCERN_GROUPS.iter().copied()),
        "approaches": groups_to_json(approaches.iter().map(|a| (a.as_str(), approach_keywords(*a)))),
        "communicationStyles": groups_to_json(styles.iter().map(|s| (s.as_str(), style_keywords(*s)))),
        "culturalSignals": CULTURAL_SIGNAL_TERMS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialty_keywords_known_concern() {
        let keywords = specialty_keywords("anxiety");
        assert!(keywords.contains(&"Panic"));
        assert!(keywords.contains(&"OCD"));
    }

    #[test]
    fn test_specialty_keywords_unknown_concern_maps_to_itself() {
        assert_eq!(specialty_keywords(" Insomnia "), vec!["Insomnia"]);
    }

    #[test]
    fn test_unsure_approach_has_no_keywords() {
        assert!(approach_keywords(ApproachPreference::Unsure).is_empty());
        assert!(style_keywords(CommunicationStyle::NoPreference).is_empty());
        assert!(faith_keywords(ReligiousPreference::Secular).is_empty());
    }

    #[test]
    fn test_taxonomy_json_contains_every_concern() {
        let json = to_json();
        let concerns = json["concerns"].as_object().unwrap();
        assert_eq!(concerns.len(), CONCERN_GROUPS.len());
        assert_eq!(json["approaches"]["practical"][0], "CBT");
    }
}
