//! Display names for conglomerate metro areas.

use indexmap::IndexSet;

use crate::error::{LoaderError, Result};

const PART_SEPARATOR: &str = ", ";
const TOKEN_SEPARATOR: &str = "-";

/// Splits a UZA name such as `"Boston-Cambridge, MA-NH"` into its city part
/// and state part.
pub fn split_uza_name(name: &str) -> Result<(&str, &str)> {
    let separators = name.matches(PART_SEPARATOR).count();
    match name.split_once(PART_SEPARATOR) {
        Some(parts) if separators == 1 => Ok(parts),
        _ => Err(LoaderError::MalformedName {
            name: name.to_string(),
            separators,
        }),
    }
}

/// Combines the UZA names of one group into a single name.
///
/// City tokens and state tokens are collected separately, de-duplicated by
/// exact string comparison and kept in first-seen order. Any malformed
/// member fails the whole group.
pub fn synthesize_name<'a, I>(members: I) -> Result<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut cities: IndexSet<&str> = IndexSet::new();
    let mut states: IndexSet<&str> = IndexSet::new();

    for member in members {
        let (city, state) = split_uza_name(member)?;
        cities.extend(city.split(TOKEN_SEPARATOR));
        states.extend(state.split(TOKEN_SEPARATOR));
    }

    let cities: Vec<&str> = cities.into_iter().collect();
    let states: Vec<&str> = states.into_iter().collect();
    Ok([cities.join(TOKEN_SEPARATOR), states.join(TOKEN_SEPARATOR)].join(PART_SEPARATOR))
}
