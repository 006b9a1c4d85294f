//! A named, immutable bundle of a [`SectionsMapper`], built once per scenario.

use crate::error::DispatchError;
use crate::section::Section;
use crate::sections_mapper::SectionsMapper;

#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub sections_mapper: SectionsMapper,
}

impl Route {
    pub fn new(name: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            name: name.into(),
            sections_mapper: SectionsMapper::new(sections),
        }
    }

    pub fn check_integrity(&self) -> Result<(), DispatchError> {
        self.sections_mapper.check_integrity()
    }
}
