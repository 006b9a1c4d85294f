//! Structural queries over the section graph, memoised against [`crate::cache::Cache`].
//!
//! Grounded on `original_source/code/app/simulation/model/sections_mapper.py`. The trickiest
//! piece to port faithfully is `get_routes_between_sections`: its Python cache key includes the
//! recursion's visited chain, not just `(start, end, reversed)` — see §9 Design Notes. This
//! implementation keys on the full chain as the source does, converted into a single joined
//! string matching the Python `';'.join(chain)` convention.

use std::collections::HashSet;

use serde_json::json;

use crate::cache::Cache;
use crate::error::DispatchError;
use crate::section::{Endpoint, Section};

/// Owns an ordered section set and answers neighbour/path/distance/turnout queries.
#[derive(Debug)]
pub struct SectionsMapper {
    pub sections: Vec<Section>,
    cache_module_name: String,
}

impl SectionsMapper {
    pub fn new(sections: Vec<Section>) -> Self {
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        let cache_module_name = format!("SectionsMapper_{}", names.join(","));
        Self {
            sections,
            cache_module_name,
        }
    }

    pub fn find_section_by_name(&self, name: &str) -> Result<&Section, DispatchError> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| DispatchError::NotFound(format!("section '{name}' not found")))
    }

    fn end_endpoint(reversed: bool) -> Endpoint {
        if reversed {
            Endpoint::StartStraight
        } else {
            Endpoint::EndStraight
        }
    }

    fn deviated_end_endpoint(reversed: bool) -> Endpoint {
        if reversed {
            Endpoint::StartDeviated
        } else {
            Endpoint::EndDeviated
        }
    }

    fn start_endpoint(reversed: bool) -> Endpoint {
        if reversed {
            Endpoint::EndStraight
        } else {
            Endpoint::StartStraight
        }
    }

    fn deviated_start_endpoint(reversed: bool) -> Endpoint {
        if reversed {
            Endpoint::EndDeviated
        } else {
            Endpoint::StartDeviated
        }
    }

    /// Neighbours reached leaving `section` ahead, in the given direction. Straight first, then
    /// deviated, matching the order the connections table is conceptually organised in (§4.1).
    pub fn get_next_sections(&self, section: &Section, reversed: bool) -> Result<Vec<&Section>, DispatchError> {
        self.ordered_neighbours(section, Self::end_endpoint(reversed), Self::deviated_end_endpoint(reversed))
    }

    pub fn get_previous_sections(&self, section: &Section, reversed: bool) -> Result<Vec<&Section>, DispatchError> {
        self.ordered_neighbours(section, Self::start_endpoint(reversed), Self::deviated_start_endpoint(reversed))
    }

    fn ordered_neighbours(
        &self,
        section: &Section,
        straight: Endpoint,
        deviated: Endpoint,
    ) -> Result<Vec<&Section>, DispatchError> {
        let mut result = Vec::new();
        for connection in section.accessible_connections(Some(straight)) {
            result.push(self.find_section_by_name(&connection.destiny_section_name)?);
        }
        for connection in section.accessible_connections(Some(deviated)) {
            result.push(self.find_section_by_name(&connection.destiny_section_name)?);
        }
        Ok(result)
    }

    /// Transitive closure of `get_next_sections`, set-semantics (order unspecified).
    pub fn get_all_sections_after(&self, section: &Section, reversed: bool) -> Result<Vec<String>, DispatchError> {
        self.transitive_closure(section, reversed, true)
    }

    pub fn get_all_sections_before(&self, section: &Section, reversed: bool) -> Result<Vec<String>, DispatchError> {
        self.transitive_closure(section, reversed, false)
    }

    fn transitive_closure(
        &self,
        section: &Section,
        reversed: bool,
        forward: bool,
    ) -> Result<Vec<String>, DispatchError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![section.name.clone()];
        while let Some(current_name) = stack.pop() {
            let current = self.find_section_by_name(&current_name)?;
            let neighbours = if forward {
                self.get_next_sections(current, reversed)?
            } else {
                self.get_previous_sections(current, reversed)?
            };
            for neighbour in neighbours {
                if visited.insert(neighbour.name.clone()) {
                    stack.push(neighbour.name.clone());
                }
            }
        }
        Ok(visited.into_iter().collect())
    }

    /// Enumerates every simple path from `a` to `b`. Memoised on the full `(a, b, reversed,
    /// chain)` key, as required by §9's correctness note.
    pub fn get_routes_between_sections(
        &self,
        a: &Section,
        b: &Section,
        reversed: bool,
        chain: &[String],
    ) -> Result<Vec<Vec<String>>, DispatchError> {
        let cache_key = format!(
            "get_routes_between_sections_{}_{}_{}_{}",
            a.name,
            b.name,
            reversed,
            chain.join(";")
        );
        if let Some(cached) = Cache::global().get_from_key(&self.cache_module_name, &cache_key) {
            if let Ok(routes) = serde_json::from_value::<Vec<Vec<String>>>(cached) {
                return Ok(routes);
            }
        }

        let mut next_chain = chain.to_vec();
        next_chain.push(a.name.clone());

        let routes = if a.name == b.name {
            vec![next_chain.clone()]
        } else {
            let mut routes = Vec::new();
            for next in self.get_next_sections(a, reversed)? {
                if next_chain.contains(&next.name) {
                    continue;
                }
                for sub_route in self.get_routes_between_sections(next, b, reversed, &next_chain)? {
                    routes.push(sub_route);
                }
            }
            routes
        };

        Cache::global().save_to_key(&self.cache_module_name, &cache_key, json!(routes));
        Ok(routes)
    }

    pub fn count_total_routes_between_sections(
        &self,
        a: &Section,
        b: &Section,
        reversed: bool,
    ) -> Result<usize, DispatchError> {
        Ok(self.get_routes_between_sections(a, b, reversed, &[])?.len())
    }

    /// Minimum summed section length over every enumerated route, or `+inf` if unreachable.
    pub fn get_distance_between_sections(
        &self,
        a: &Section,
        b: &Section,
        reversed: bool,
    ) -> Result<f64, DispatchError> {
        let routes = self.get_routes_between_sections(a, b, reversed, &[])?;
        let mut best = f64::INFINITY;
        for route in &routes {
            let mut total = 0.0;
            for name in route {
                total += self.find_section_by_name(name)?.length;
            }
            if total < best {
                best = total;
            }
        }
        Ok(best)
    }

    fn walk_to_turnout(&self, section: &Section, reversed: bool, forward: bool) -> Result<Option<String>, DispatchError> {
        let mut current = section.clone();
        loop {
            let neighbours = if forward {
                self.get_next_sections(&current, reversed)?
            } else {
                self.get_previous_sections(&current, reversed)?
            };
            let Some(first) = neighbours.first() else {
                return Ok(None);
            };
            let first = (*first).clone();
            if first.is_turnout() {
                return Ok(Some(first.name));
            }
            current = first;
        }
    }

    pub fn get_next_turnout(&self, from_section: &Section, reversed: bool) -> Result<Option<&Section>, DispatchError> {
        match self.walk_to_turnout(from_section, reversed, true)? {
            Some(name) => Ok(Some(self.find_section_by_name(&name)?)),
            None => Ok(None),
        }
    }

    pub fn get_previous_turnout(&self, from_section: &Section, reversed: bool) -> Result<Option<&Section>, DispatchError> {
        match self.walk_to_turnout(from_section, reversed, false)? {
            Some(name) => Ok(Some(self.find_section_by_name(&name)?)),
            None => Ok(None),
        }
    }

    /// Sections with no connection at all on their "start" side (`want_start = true`) or "end"
    /// side (`want_start = false`) — i.e. route endpoints, matching the source's aggregated
    /// `accessible_connections("start")` / `accessible_connections("end")` check.
    fn endpoints_of_kind(&self, want_start: bool) -> Vec<&Section> {
        self.sections
            .iter()
            .filter(|section| {
                let has_any = [Endpoint::StartStraight, Endpoint::StartDeviated, Endpoint::EndStraight, Endpoint::EndDeviated]
                    .into_iter()
                    .filter(|e| e.is_start() == want_start)
                    .any(|e| !section.accessible_connections(Some(e)).is_empty());
                !has_any
            })
            .collect()
    }

    /// For every (start-endpoint, end-endpoint) pair, the count of simple forward paths must
    /// equal the count of simple reverse paths between the opposite endpoints.
    pub fn check_integrity(&self) -> Result<(), DispatchError> {
        let start_endpoints = self.endpoints_of_kind(true);
        let end_endpoints = self.endpoints_of_kind(false);

        for start in &start_endpoints {
            for end in &end_endpoints {
                if start.name == end.name {
                    continue;
                }
                let forward = self.count_total_routes_between_sections(start, end, false)?;
                let backward = self.count_total_routes_between_sections(end, start, true)?;
                if forward != backward {
                    return Err(DispatchError::ConflictCondition(format!(
                        "integrity check failed between {} and {}: {} forward routes vs {} reverse routes",
                        start.name, end.name, forward, backward
                    )));
                }
            }
        }
        Ok(())
    }
}
