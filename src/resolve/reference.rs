use crate::model::{InstanceId, SchemaMap};

/// A registry hit for an instance. `aliases` lists any further names bound to
/// the same instance, in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatch<'a> {
    pub name: &'a str,
    pub aliases: Vec<&'a str>,
}

impl ReferenceMatch<'_> {
    pub fn is_ambiguous(&self) -> bool {
        !self.aliases.is_empty()
    }

    pub fn all_names(&self) -> Vec<String> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .map(str::to_owned)
            .collect()
    }
}

/// First registry name bound to `id`, compared by identity token only.
pub fn find_reference(id: InstanceId, registry: &SchemaMap) -> Option<ReferenceMatch<'_>> {
    let mut names = registry
        .entries()
        .filter(|(_, bound)| *bound == id)
        .map(|(name, _)| name);
    let name = names.next()?;
    Some(ReferenceMatch { name, aliases: names.collect() })
}
