use super::{Context, FacetProcessor};
use crate::error::Result;
use crate::models::{Facets, Generic};
use async_trait::async_trait;

/// Marks every directory that has at least one file.
pub struct GenericProcessor;

#[async_trait]
impl FacetProcessor for GenericProcessor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn can_process(&self, _file: &str) -> bool {
        true
    }

    async fn add_file(&self, _cx: &Context<'_>, facets: &mut Facets, _file: &str, _partial: bool) -> Result<()> {
        facets.generic.get_or_insert_with(Generic::default);
        Ok(())
    }

    async fn remove_file(&self, _cx: &Context<'_>, _facets: &mut Facets, _file: &str) -> Result<()> {
        Ok(())
    }
}
