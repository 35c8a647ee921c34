//! Validator/Assembler.
//!
//! Turns staged [`Maker`] values into parse-side [`Element`]s:
//!
//! 1. An untouched maker is absent: nothing is written ([`Commit::Absent`]).
//! 2. The effective required fields of a touched maker are checked; any unset
//!    one fails the commit with `MissingRequiredField` and nothing is written.
//! 3. Nested repeated entries are validated the same way, before any write.
//! 4. The target node is reused (or created), repeated entries are reconciled
//!    by position and scalars are copied.
//!
//! Effective required fields: a required field beneath an *optional* singular
//! child only counts once that child was touched. Setting only
//! `sandbox_enabled` therefore does not make `sandbox` required, but leaves the
//! required `partner_id` unset.

use log::trace;

use crate::element::Element;
use crate::host::Extensions;
use crate::maker::{Maker, MakerSlot, MakerState};
use crate::schema::{ElementKind, ElementType, FieldLeaf, FieldPath, NamespaceSchema};
use crate::{Error, Result};

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Nothing was set; the target was left alone.
    Absent,
    /// The instance was written.
    Assembled,
}

/// Required names whose field is not set on `record`, in the given order.
pub fn unset_required<'n, S: AsRef<str>>(record: &Maker, required_names: &'n [S]) -> Vec<&'n str> {
    required_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !record.is_set(name))
        .collect()
}

/// Effective required flat fields of `maker`, in declaration order.
pub fn required_names(maker: &Maker) -> Vec<String> {
    let ty = maker.element_type();
    ty.fields()
        .filter(|(_, path)| !path.is_list() && is_effectively_required(ty, path, maker))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn is_effectively_required(ty: &ElementType, path: &FieldPath, maker: &Maker) -> bool {
    let mut current_ty = ty;
    let mut current = Some(maker);
    for &step in path.steps() {
        let Some(descriptor) = current_ty.descriptor_at(step) else {
            return false;
        };
        let nested = current.and_then(|m| match &m.slots()[step] {
            MakerSlot::Nested(n) => n.as_deref(),
            _ => None,
        });
        if !descriptor.is_required() && !nested.is_some_and(Maker::is_touched) {
            return false;
        }
        let Some(next_ty) = descriptor.element_type() else {
            return false;
        };
        current_ty = next_ty;
        current = nested;
    }
    match path.leaf() {
        FieldLeaf::Descriptor(index) => current_ty.descriptor_at(index).is_some_and(|d| d.is_required()),
        FieldLeaf::Content => false,
    }
}

/// Commits one extension instance into `slot`.
///
/// `path` identifies the instance in errors, e.g. `channel.spotify_access`.
pub fn commit(maker: &mut Maker, slot: &mut Option<Element>, path: &str) -> Result<Commit> {
    match validate(maker, path) {
        Ok(false) => Ok(Commit::Absent),
        Ok(true) => {
            let node = slot.get_or_insert_with(|| Element::new(maker.element_type().clone()));
            write(maker, node)?;
            maker.record_commit(MakerState::Complete);
            trace!("assembled {path}");
            Ok(Commit::Assembled)
        }
        Err(err) => {
            maker.record_commit(MakerState::Rejected);
            Err(err)
        }
    }
}

/// Commits the root maker of `schema` onto a host.
///
/// Every top-level instance is validated before the first write, so a failing
/// schema leaves `host` unchanged.
pub fn commit_schema(root: &mut Maker, schema: &NamespaceSchema, host: &mut Extensions) -> Result<Commit> {
    if !root.is_touched() {
        return Ok(Commit::Absent);
    }
    if let Err(err) = validate_schema(root, schema) {
        root.record_commit(MakerState::Rejected);
        return Err(err);
    }

    let node = host.get_or_insert(schema);
    write(root, node)?;
    root.record_commit(MakerState::Complete);
    trace!("assembled {}", schema.key());
    Ok(Commit::Assembled)
}

fn validate_schema(root: &Maker, schema: &NamespaceSchema) -> Result<()> {
    let missing: Vec<String> = schema
        .iter()
        .filter(|d| d.is_required() && !root.is_set(d.name()))
        .map(|d| d.name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::missing_required(schema.target().name(), missing));
    }

    for (descriptor, slot) in schema.iter().zip(root.slots()) {
        let path = schema.path_of(descriptor.name());
        match slot {
            MakerSlot::Nested(Some(instance)) => {
                validate(instance, &path)?;
            }
            MakerSlot::List(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    validate(entry, &format!("{path}[{i}]"))?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Returns whether the instance is present; fails on unset required fields.
fn validate(maker: &Maker, path: &str) -> Result<bool> {
    if !maker.is_touched() {
        return Ok(false);
    }
    let required = required_names(maker);
    let missing = unset_required(maker, &required);
    if !missing.is_empty() {
        return Err(Error::missing_required(path, missing.into_iter().map(str::to_string).collect()));
    }
    validate_lists(maker, path)?;
    Ok(true)
}

/// Validates repeated entries at any depth beneath `maker`.
fn validate_lists(maker: &Maker, path: &str) -> Result<()> {
    for (descriptor, slot) in maker.element_type().descriptors().zip(maker.slots()) {
        match slot {
            MakerSlot::Nested(Some(nested)) if nested.is_touched() => {
                validate_lists(nested, &format!("{path}.{}", descriptor.name()))?;
            }
            MakerSlot::List(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    validate(entry, &format!("{path}.{}[{i}]", descriptor.name()))?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Makes `node` mirror the staged values. Only called after validation.
///
/// A reused node loses whatever was cleared on the maker since the last
/// commit: unset scalars, untouched optional children and surplus entries.
fn write(maker: &Maker, node: &mut Element) -> Result<()> {
    let ty = maker.element_type().clone();
    for (index, (descriptor, slot)) in ty.descriptors().zip(maker.slots()).enumerate() {
        match slot {
            MakerSlot::Value(Some(value)) => node.set_value_at(index, value.clone())?,
            MakerSlot::Value(None) => node.clear_at(index),
            MakerSlot::Nested(nested) => match nested.as_deref().filter(|m| m.is_touched()) {
                Some(nested) => write(nested, node.child_mut_at(index))?,
                None if descriptor.is_required() => {
                    // Pflichtkind ohne Werte: leere Instanz.
                    let Some(child_ty) = descriptor.element_type() else {
                        return Err(descriptor.kind_mismatch("a singular element"));
                    };
                    node.set_child_at(index, Element::new(child_ty.clone()));
                }
                None => {
                    node.take_child_at(index);
                }
            },
            MakerSlot::List(entries) => {
                let Some(entry_ty) = descriptor.element_type() else {
                    return Err(descriptor.kind_mismatch("a repeated element"));
                };
                debug_assert_eq!(descriptor.kind(), ElementKind::Repeated);
                let children = node.children_mut_at(index);
                // Position k der Eintraege entspricht Kind k: erneutes Commit ist idempotent.
                let mut written = 0;
                for entry in entries.iter().filter(|e| e.is_touched()) {
                    if written < children.len() {
                        write(entry, &mut children[written])?;
                    } else {
                        let mut child = Element::new(entry_ty.clone());
                        write(entry, &mut child)?;
                        children.push(child);
                    }
                    written += 1;
                }
                children.truncate(written);
            }
        }
    }
    match maker.content() {
        Some(content) => node.set_content_value(content.clone())?,
        None => node.clear_content(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::schema::Target;
    use crate::spotify;

    fn access_maker() -> Maker {
        let schema = registry::global().lookup(spotify::EXTENSION, Target::Channel).unwrap();
        let ty = schema.lookup("access").unwrap().element_type().unwrap().clone();
        Maker::new(ty)
    }

    #[test]
    fn unset_required_is_pure() {
        let mut m = access_maker();
        let names = ["partner_id", "sandbox_enabled"];
        assert_eq!(unset_required(&m, &names), vec!["partner_id", "sandbox_enabled"]);
        m.set("partner_id", "1").unwrap();
        assert_eq!(unset_required(&m, &names), vec!["sandbox_enabled"]);
        assert!(unset_required::<&str>(&m, &[]).is_empty());
    }

    #[test]
    fn optional_child_becomes_required_once_touched() {
        let mut m = access_maker();
        assert_eq!(required_names(&m), vec!["partner_id"]);
        m.set("sandbox_enabled", "true").unwrap();
        assert_eq!(required_names(&m), vec!["partner_id", "sandbox_enabled"]);
    }

    #[test]
    fn absent_instance_writes_nothing() {
        let mut m = access_maker();
        let mut slot = None;
        assert_eq!(commit(&mut m, &mut slot, "channel.spotify_access").unwrap(), Commit::Absent);
        assert!(slot.is_none());
        assert_eq!(m.state(), MakerState::Untouched);
    }

    #[test]
    fn sandbox_only_is_missing_partner_id() {
        let mut m = access_maker();
        m.set("sandbox_enabled", "true").unwrap();
        let mut slot = None;
        let err = commit(&mut m, &mut slot, "channel.spotify_access").unwrap_err();
        assert_eq!(err, Error::missing_required("channel.spotify_access", vec!["partner_id".into()]));
        assert!(slot.is_none());
        assert_eq!(m.state(), MakerState::Rejected);
    }

    #[test]
    fn complete_instance_is_assembled_and_recommit_is_idempotent() {
        let mut m = access_maker();
        m.set("partner_id", "42").unwrap();
        m.set_value("sandbox_enabled", false).unwrap();
        let mut slot = None;
        assert_eq!(commit(&mut m, &mut slot, "channel.spotify_access").unwrap(), Commit::Assembled);
        assert_eq!(m.state(), MakerState::Complete);
        let first = slot.clone().unwrap();
        assert_eq!(spotify::partner_id(&first), Some("42"));
        assert_eq!(spotify::sandbox_enabled(&first), Some(false));

        commit(&mut m, &mut slot, "channel.spotify_access").unwrap();
        assert_eq!(slot.unwrap(), first);
    }

    #[test]
    fn partner_only_creates_no_sandbox() {
        let mut m = access_maker();
        m.set("partner_id", "42").unwrap();
        let mut slot = None;
        commit(&mut m, &mut slot, "channel.spotify_access").unwrap();
        let access = slot.unwrap();
        assert!(access.child("partner").unwrap().is_some());
        assert!(access.child("sandbox").unwrap().is_none());
    }

    #[test]
    fn recommit_after_clear_drops_cleared_values() {
        let mut m = access_maker();
        m.set("partner_id", "42").unwrap();
        m.set("sandbox_enabled", "true").unwrap();
        let mut slot = None;
        commit(&mut m, &mut slot, "channel.spotify_access").unwrap();
        assert_eq!(spotify::sandbox_enabled(slot.as_ref().unwrap()), Some(true));

        m.clear("sandbox_enabled").unwrap();
        commit(&mut m, &mut slot, "channel.spotify_access").unwrap();
        assert_eq!(m.state(), MakerState::Complete);
        let access = slot.unwrap();
        assert_eq!(spotify::sandbox_enabled(&access), None);
        assert!(access.child("sandbox").unwrap().is_none());
        assert_eq!(spotify::partner_id(&access), Some("42"));
    }

    #[test]
    fn recommit_drops_surplus_entries_and_content() {
        use crate::namespace::Namespace;
        use crate::schema::ElementDescriptor as D;
        use crate::value::ValueType;

        let ns = Namespace::new("ex", "urn:example");
        let tag = ElementType::builder("tag", ns).content(ValueType::String).build().unwrap();
        let ty = ElementType::builder("box", ns)
            .with(D::attribute("label", ValueType::String))
            .unwrap()
            .with(D::repeated("tag", tag))
            .unwrap()
            .build()
            .unwrap();
        let mut m = Maker::new(ty);
        m.set("label", "l").unwrap();
        for term in ["a", "b"] {
            m.append("tag").unwrap().set("content", term).unwrap();
        }
        let mut slot = None;
        commit(&mut m, &mut slot, "item.ex_box").unwrap();
        assert_eq!(slot.as_ref().unwrap().children("tag").unwrap().len(), 2);

        let mut fresh = Maker::new(m.element_type().clone());
        fresh.append("tag").unwrap().set("content", "c").unwrap();
        commit(&mut fresh, &mut slot, "item.ex_box").unwrap();
        let node = slot.unwrap();
        assert_eq!(node.get("label").unwrap(), None);
        let tags = node.children("tag").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].content().and_then(|v| v.as_str()), Some("c"));
    }

    #[test]
    fn schema_commit_is_all_or_nothing() {
        let schema = registry::global().lookup(spotify::EXTENSION, Target::Channel).unwrap();
        let mut root = Maker::for_schema(schema);
        root.nested("access").unwrap().set("sandbox_enabled", "1").unwrap();
        let mut host = Extensions::new();
        let err = commit_schema(&mut root, schema, &mut host).unwrap_err();
        assert_eq!(err.missing_fields(), Some(&["partner_id".to_string()][..]));
        assert!(matches!(&err, Error::MissingRequiredField { path, .. } if path == "channel.spotify_access"));
        assert!(host.is_empty());
        assert_eq!(root.state(), MakerState::Rejected);

        root.nested("access").unwrap().set("partner_id", "p").unwrap();
        assert_eq!(commit_schema(&mut root, schema, &mut host).unwrap(), Commit::Assembled);
        assert_eq!(root.state(), MakerState::Complete);
        let access = host.get(spotify::EXTENSION).unwrap().child("access").unwrap().unwrap();
        assert_eq!(spotify::partner_id(access), Some("p"));
        assert_eq!(spotify::sandbox_enabled(access), Some(true));
    }
}
