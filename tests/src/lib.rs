//! Cross-crate tests for the thicket workspace.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod core {
    mod demote;
    mod module;
}

#[cfg(test)]
mod transforms {
    mod bogus_flow;
    mod opaque_predicate;
    mod pass;
}
