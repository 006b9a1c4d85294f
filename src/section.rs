//! Immutable topology nodes.
//!
//! A [`Section`] is a named stretch of single track. It never mutates its own topology after
//! construction; the only runtime state it carries is the interdiction flag, toggled by the
//! dispatcher in response to external signalling, not by trains themselves.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Which port of a section a connection attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    StartStraight,
    StartDeviated,
    EndStraight,
    EndDeviated,
}

impl Endpoint {
    const ALL: [Endpoint; 4] = [
        Endpoint::StartStraight,
        Endpoint::StartDeviated,
        Endpoint::EndStraight,
        Endpoint::EndDeviated,
    ];

    /// Parses the external `when_at` string used by section descriptors (§6 Inputs).
    pub fn parse(raw: &str) -> Result<Endpoint, DispatchError> {
        match raw {
            "start_straight" => Ok(Endpoint::StartStraight),
            "start_deviated" => Ok(Endpoint::StartDeviated),
            "end_straight" => Ok(Endpoint::EndStraight),
            "end_deviated" => Ok(Endpoint::EndDeviated),
            other => Err(DispatchError::InvalidChoice(format!(
                "unknown connection endpoint '{other}'"
            ))),
        }
    }

    /// True if the endpoint sits at the "start" side of a section.
    pub fn is_start(self) -> bool {
        matches!(self, Endpoint::StartStraight | Endpoint::StartDeviated)
    }

    /// True if the endpoint is a deviated (as opposed to straight) port.
    pub fn is_deviated(self) -> bool {
        matches!(self, Endpoint::StartDeviated | Endpoint::EndDeviated)
    }

    /// The endpoint reached after a train having entered via `self` fully traverses the section
    /// and flips direction, i.e. the paired endpoint on the opposite side keeping straight/deviated.
    pub fn paired_on_reverse(self) -> Endpoint {
        match self {
            Endpoint::StartStraight | Endpoint::EndDeviated => Endpoint::EndStraight,
            Endpoint::EndStraight | Endpoint::StartDeviated => Endpoint::StartStraight,
        }
    }
}

/// Direction a train may travel a section flow restriction allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Flow {
    #[default]
    Both,
    NormalOnly,
    ReverseOnly,
}

/// A directed edge from one section to another, tagged with the origin endpoint used to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConnection {
    pub destiny_section_name: String,
    pub connection_origin: Endpoint,
}

impl SectionConnection {
    pub fn new(destiny_section_name: impl Into<String>, connection_origin: Endpoint) -> Self {
        Self {
            destiny_section_name: destiny_section_name.into(),
            connection_origin,
        }
    }
}

/// A velocity cap active over a sub-range of a section, expressed in absolute kilometres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRestriction {
    start_position: f64,
    end_position: f64,
    pub max_velocity: f64,
}

impl SectionRestriction {
    pub fn new(section_start_km: f64, section_length: f64, start_km: f64, end_km: f64, max_velocity: f64) -> Self {
        Self {
            start_position: (start_km - section_start_km) / section_length,
            end_position: (end_km - section_start_km) / section_length,
            max_velocity,
        }
    }

    pub fn is_active_at_position(&self, relative_position: f64) -> bool {
        relative_position >= self.start_position && relative_position <= self.end_position
    }
}

/// An immutable stretch of single track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start_kilometre: f64,
    pub length: f64,
    pub flow: Flow,
    pub connections: Vec<SectionConnection>,
    pub restrictions: Vec<SectionRestriction>,
    pub lines: Vec<String>,
    pub description: String,
    pub max_velocity: f64,
    pub interdicted: bool,
}

impl Section {
    pub const DEFAULT_MAX_VELOCITY: f64 = 60.0;

    pub fn new(name: impl Into<String>, start_kilometre: f64, length: f64) -> Self {
        Self {
            name: name.into(),
            start_kilometre,
            length,
            flow: Flow::Both,
            connections: Vec::new(),
            restrictions: Vec::new(),
            lines: Vec::new(),
            description: String::new(),
            max_velocity: Self::DEFAULT_MAX_VELOCITY,
            interdicted: false,
        }
    }

    pub fn end_kilometre(&self) -> f64 {
        self.start_kilometre + self.length
    }

    /// Connections reachable from a given origin. `origin` selects one of the 4 endpoints, or,
    /// when `None`, every connection regardless of endpoint.
    pub fn accessible_connections(&self, origin: Option<Endpoint>) -> Vec<&SectionConnection> {
        match origin {
            None => self.connections.iter().collect(),
            Some(endpoint) => self
                .connections
                .iter()
                .filter(|c| c.connection_origin == endpoint)
                .collect(),
        }
    }

    /// A section is a turnout iff it has more than two *distinct* accessible neighbours.
    /// See DESIGN.md Open Question 2: this dedupes by destination name, departing from a
    /// literal transliteration of the source which counts raw connection records.
    pub fn is_turnout(&self) -> bool {
        let mut names: Vec<&str> = self
            .connections
            .iter()
            .map(|c| c.destiny_section_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len() > 2
    }

    pub fn maximum_velocity_at_relative_position(&self, relative_position: f64) -> f64 {
        self.restrictions
            .iter()
            .filter(|r| r.is_active_at_position(relative_position))
            .map(|r| r.max_velocity)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
            .unwrap_or(self.max_velocity)
    }

    pub fn interdict(&mut self) -> Result<(), DispatchError> {
        if self.interdicted {
            return Err(DispatchError::ConflictCondition(format!(
                "section {} is already interdicted",
                self.name
            )));
        }
        self.interdicted = true;
        Ok(())
    }

    pub fn clear_interdiction(&mut self) -> Result<(), DispatchError> {
        if !self.interdicted {
            return Err(DispatchError::ConflictCondition(format!(
                "section {} is not interdicted",
                self.name
            )));
        }
        self.interdicted = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_section() -> Section {
        let mut s = Section::new("A", 0.0, 1000.0);
        s.connections.push(SectionConnection::new("B", Endpoint::EndStraight));
        s
    }

    #[test]
    fn turnout_requires_more_than_two_distinct_neighbours() {
        let mut s = sample_section();
        assert!(!s.is_turnout());
        s.connections.push(SectionConnection::new("C", Endpoint::EndDeviated));
        assert!(!s.is_turnout());
        s.connections.push(SectionConnection::new("D", Endpoint::StartStraight));
        assert!(s.is_turnout());
    }

    #[test]
    fn duplicate_destination_does_not_count_twice_towards_turnout() {
        let mut s = sample_section();
        s.connections.push(SectionConnection::new("B", Endpoint::StartStraight));
        assert!(!s.is_turnout());
    }

    #[test]
    fn interdiction_is_a_state_transition_not_idempotent() {
        let mut s = sample_section();
        assert!(s.interdict().is_ok());
        assert!(s.interdict().is_err());
        assert!(s.clear_interdiction().is_ok());
        assert!(s.clear_interdiction().is_err());
    }

    #[test]
    fn restriction_lowers_velocity_only_within_its_range() {
        let mut s = sample_section();
        s.restrictions.push(SectionRestriction::new(0.0, 1000.0, 200.0, 400.0, 30.0));
        assert_eq!(s.maximum_velocity_at_relative_position(0.1), 60.0);
        assert_eq!(s.maximum_velocity_at_relative_position(0.3), 30.0);
        assert_eq!(s.maximum_velocity_at_relative_position(0.9), 60.0);
    }

    #[test]
    fn serialising_a_section_round_trips() {
        let s = sample_section();
        let json = serde_json::to_string(&s).unwrap();
        let back: Section = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
