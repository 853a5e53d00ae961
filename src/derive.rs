//! Pure derivations for child records: age from birthdate, classroom bracket
//! from age, default relationship from gender. Invoked by the resolvers
//! whenever these inputs are set or change, so stored rows are always
//! self-consistent; nothing here touches storage or the wall clock.

use chrono::{Datelike, NaiveDate};

use crate::models::{child::AgeBracket, Gender};

/// Whole years elapsed between `birth_date` and `as_of`. The reference date
/// is explicit so weekly runs are reproducible in tests.
pub fn age_from_birthdate(birth_date: NaiveDate, as_of: NaiveDate) -> i32 {
    let mut age = as_of.year() - birth_date.year();
    if (as_of.month(), as_of.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// Bracket boundaries are inclusive on both ends. `None` (the form's age cell
/// was non-numeric) and negative ages map to `Unknown`.
pub fn age_bracket(age: Option<i32>) -> AgeBracket {
    match age {
        Some(0..=2) => AgeBracket::Nursery,
        Some(3..=5) => AgeBracket::Kindergarten,
        Some(6..=9) => AgeBracket::Primary,
        Some(10..=12) => AgeBracket::Juniors,
        Some(n) if n >= 13 => AgeBracket::Teens,
        _ => AgeBracket::Unknown,
    }
}

/// Fallback relationship label when the form left it blank. An explicit
/// value ("Ward", "Niece", ...) always wins over this.
pub fn default_relationship(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "Son",
        Gender::Female => "Daughter",
    }
}

/// Resolve the relationship to store: the explicit non-empty value if one
/// was supplied, else the gender default.
pub fn relationship_or_default(explicit: Option<&str>, gender: Gender) -> String {
    match explicit.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => default_relationship(gender).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn age_counts_whole_years_only() {
        // Birthday not yet reached this year
        assert_eq!(age_from_birthdate(d(2019, 6, 15), d(2024, 6, 14)), 4);
        // Birthday exactly today
        assert_eq!(age_from_birthdate(d(2019, 6, 15), d(2024, 6, 15)), 5);
        // Birthday already passed
        assert_eq!(age_from_birthdate(d(2019, 6, 15), d(2024, 12, 1)), 5);
    }

    #[test]
    fn bracket_boundaries_are_inclusive() {
        assert_eq!(age_bracket(Some(0)), AgeBracket::Nursery);
        assert_eq!(age_bracket(Some(2)), AgeBracket::Nursery);
        assert_eq!(age_bracket(Some(3)), AgeBracket::Kindergarten);
        assert_eq!(age_bracket(Some(5)), AgeBracket::Kindergarten);
        assert_eq!(age_bracket(Some(6)), AgeBracket::Primary);
        assert_eq!(age_bracket(Some(9)), AgeBracket::Primary);
        assert_eq!(age_bracket(Some(10)), AgeBracket::Juniors);
        assert_eq!(age_bracket(Some(12)), AgeBracket::Juniors);
        assert_eq!(age_bracket(Some(13)), AgeBracket::Teens);
        assert_eq!(age_bracket(Some(40)), AgeBracket::Teens);
    }

    #[test]
    fn bad_ages_are_unknown() {
        assert_eq!(age_bracket(Some(-1)), AgeBracket::Unknown);
        assert_eq!(age_bracket(None), AgeBracket::Unknown);
    }

    #[test]
    fn relationship_defaults_by_gender() {
        assert_eq!(relationship_or_default(None, Gender::Female), "Daughter");
        assert_eq!(relationship_or_default(None, Gender::Male), "Son");
        assert_eq!(relationship_or_default(Some(""), Gender::Male), "Son");
    }

    #[test]
    fn explicit_relationship_is_preserved() {
        assert_eq!(relationship_or_default(Some("Ward"), Gender::Female), "Ward");
        assert_eq!(relationship_or_default(Some("Ward"), Gender::Male), "Ward");
    }

    #[test]
    fn bracket_display_includes_year_range() {
        assert_eq!(age_bracket(Some(5)).as_str(), "Kindergarten (3-5 years)");
    }
}
