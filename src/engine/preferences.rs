use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::roster_index::RosterIndex;
use crate::models::ShiftType;

/// A `(date, acceptedTypes)` entry; an empty type set accepts any type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub date: NaiveDate,
    pub accepted_types: BTreeSet<ShiftType>,
}

impl Preference {
    pub fn accepts(&self, shift_type: ShiftType) -> bool {
        self.accepted_types.is_empty() || self.accepted_types.contains(&shift_type)
    }
}

/// How a candidate shift fits a request's preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceFit {
    Accepted,
    DateNotPreferred,
    TypeNotAccepted,
}

pub struct PreferenceResolver<'a> {
    index: &'a RosterIndex,
}

impl<'a> PreferenceResolver<'a> {
    pub fn new(index: &'a RosterIndex) -> Self {
        Self { index }
    }

    /// The request's entries in stored order.
    pub fn for_request(&self, request_id: i32) -> impl Iterator<Item = Preference> + '_ {
        self.index
            .preferred_dates(request_id)
            .iter()
            .map(|p| Preference {
                date: p.date,
                accepted_types: p.accepted_types.clone(),
            })
    }

    /// Several entries for the same date are OR-ed together.
    pub fn fit(&self, request_id: i32, date: NaiveDate, shift_type: ShiftType) -> PreferenceFit {
        let mut date_seen = false;
        for preference in self.for_request(request_id).filter(|p| p.date == date) {
            if preference.accepts(shift_type) {
                return PreferenceFit::Accepted;
            }
            date_seen = true;
        }

        if date_seen {
            PreferenceFit::TypeNotAccepted
        } else {
            PreferenceFit::DateNotPreferred
        }
    }
}
