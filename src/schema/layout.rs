//! Field offsets and type tags resolved from [`SnapshotMeta`].

use super::meta::SnapshotMeta;
use crate::snapshot_error::SnapshotError;

/// Tag value used for a type name the schema does not enumerate.
///
/// Buffer tags are small indexes into the enumeration, so this never matches.
pub const NO_TAG: u32 = u32::MAX;

fn required(fields: &[String], record: &'static str, field: &'static str) -> Result<usize, SnapshotError> {
    fields
        .iter()
        .position(|f| f == field)
        .ok_or(SnapshotError::MissingField { record, field })
}

fn optional(fields: &[String], field: &str) -> Option<usize> {
    fields.iter().position(|f| f == field)
}

fn tag(types: &[String], name: &str) -> u32 {
    types
        .iter()
        .position(|t| t == name)
        .map_or(NO_TAG, |i| i as u32)
}

/// Node record layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLayout {
    pub field_count: usize,
    pub type_offset: usize,
    pub name_offset: usize,
    pub id_offset: usize,
    pub self_size_offset: usize,
    pub edge_count_offset: usize,
    pub trace_node_id_offset: Option<usize>,
    /// Tag index → type name.
    pub types: Vec<String>,
    pub hidden: u32,
    pub array: u32,
    pub string: u32,
    pub object: u32,
    pub code: u32,
    pub native: u32,
    pub synthetic: u32,
    pub cons_string: u32,
    pub sliced_string: u32,
}

/// Edge record layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeLayout {
    pub field_count: usize,
    pub type_offset: usize,
    pub name_offset: usize,
    pub to_node_offset: usize,
    /// Tag index → type name; always ends with the synthetic `invisible` type.
    pub types: Vec<String>,
    pub context: u32,
    pub element: u32,
    pub property: u32,
    pub internal: u32,
    pub hidden: u32,
    pub shortcut: u32,
    pub weak: u32,
    pub invisible: u32,
}

impl EdgeLayout {
    /// Weak and shortcut edges never establish ownership.
    #[inline]
    pub fn is_non_owning(&self, edge_type: u32) -> bool {
        edge_type == self.weak || edge_type == self.shortcut
    }
}

/// Sample record layout, present only for allocation-timeline snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleLayout {
    pub field_count: usize,
    pub timestamp_offset: usize,
    pub last_assigned_id_offset: usize,
}

/// Offsets and tags for every record kind of a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotLayout {
    pub node: NodeLayout,
    pub edge: EdgeLayout,
    pub sample: Option<SampleLayout>,
}

impl SnapshotLayout {
    /// Resolve all offsets from the schema metadata.
    ///
    /// # Errors
    /// [`SnapshotError::MissingField`] when a required field is not named and
    /// [`SnapshotError::MissingTypeEnum`] when a `type` field has no enumeration.
    pub fn from_meta(meta: &SnapshotMeta) -> Result<Self, SnapshotError> {
        let nf = &meta.node_fields;
        let type_offset = required(nf, "node", "type")?;
        let node_types: Vec<String> = meta
            .node_types
            .get(type_offset)
            .and_then(|t| t.as_enum())
            .ok_or(SnapshotError::MissingTypeEnum("node"))?
            .to_vec();
        let node = NodeLayout {
            field_count: nf.len(),
            type_offset,
            name_offset: required(nf, "node", "name")?,
            id_offset: required(nf, "node", "id")?,
            self_size_offset: required(nf, "node", "self_size")?,
            edge_count_offset: required(nf, "node", "edge_count")?,
            trace_node_id_offset: optional(nf, "trace_node_id"),
            hidden: tag(&node_types, "hidden"),
            array: tag(&node_types, "array"),
            string: tag(&node_types, "string"),
            object: tag(&node_types, "object"),
            code: tag(&node_types, "code"),
            native: tag(&node_types, "native"),
            synthetic: tag(&node_types, "synthetic"),
            cons_string: tag(&node_types, "concatenated string"),
            sliced_string: tag(&node_types, "sliced string"),
            types: node_types,
        };

        let ef = &meta.edge_fields;
        let edge_type_offset = required(ef, "edge", "type")?;
        let mut edge_types: Vec<String> = meta
            .edge_types
            .get(edge_type_offset)
            .and_then(|t| t.as_enum())
            .ok_or(SnapshotError::MissingTypeEnum("edge"))?
            .to_vec();
        edge_types.push("invisible".to_owned());
        let edge = EdgeLayout {
            field_count: ef.len(),
            type_offset: edge_type_offset,
            name_offset: required(ef, "edge", "name_or_index")?,
            to_node_offset: required(ef, "edge", "to_node")?,
            context: tag(&edge_types, "context"),
            element: tag(&edge_types, "element"),
            property: tag(&edge_types, "property"),
            internal: tag(&edge_types, "internal"),
            hidden: tag(&edge_types, "hidden"),
            shortcut: tag(&edge_types, "shortcut"),
            weak: tag(&edge_types, "weak"),
            invisible: tag(&edge_types, "invisible"),
            types: edge_types,
        };

        let sf = &meta.sample_fields;
        let sample = match (optional(sf, "timestamp_us"), optional(sf, "last_assigned_id")) {
            (Some(timestamp_offset), Some(last_assigned_id_offset)) => Some(SampleLayout {
                field_count: sf.len(),
                timestamp_offset,
                last_assigned_id_offset,
            }),
            _ => None,
        };

        Ok(Self { node, edge, sample })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::meta::FieldTypes;

    #[test]
    fn v8_offsets() {
        let l = SnapshotLayout::from_meta(&SnapshotMeta::v8()).unwrap();
        assert_eq!(l.node.field_count, 6);
        assert_eq!(l.node.self_size_offset, 3);
        assert_eq!(l.node.trace_node_id_offset, Some(5));
        assert_eq!(l.edge.to_node_offset, 2);
        assert_eq!(l.edge.weak, 6);
        assert_eq!(l.edge.invisible, 7);
        assert_eq!(l.node.native, 8);
        assert!(l.sample.is_some());
    }

    #[test]
    fn reordered_fields_move_offsets() {
        let mut meta = SnapshotMeta::v8();
        meta.node_fields.swap(0, 3);
        meta.node_types.swap(0, 3);
        meta.edge_fields.reverse();
        meta.edge_types.reverse();
        let l = SnapshotLayout::from_meta(&meta).unwrap();
        assert_eq!(l.node.type_offset, 3);
        assert_eq!(l.node.self_size_offset, 0);
        assert_eq!(l.edge.type_offset, 2);
        assert_eq!(l.edge.to_node_offset, 0);
        assert_eq!(l.edge.shortcut, 5);
    }

    #[test]
    fn missing_field_is_reported() {
        let mut meta = SnapshotMeta::v8();
        meta.node_fields.retain(|f| f != "edge_count");
        let err = SnapshotLayout::from_meta(&meta).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::MissingField {
                record: "node",
                field: "edge_count"
            }
        );
    }

    #[test]
    fn missing_type_enum_is_reported() {
        let mut meta = SnapshotMeta::v8();
        meta.edge_types[0] = FieldTypes::Scalar("number".into());
        assert_eq!(
            SnapshotLayout::from_meta(&meta).unwrap_err(),
            SnapshotError::MissingTypeEnum("edge")
        );
    }

    #[test]
    fn unknown_types_never_match() {
        let mut meta = SnapshotMeta::v8();
        meta.node_types[0] = FieldTypes::Enum(vec!["object".into()]);
        let l = SnapshotLayout::from_meta(&meta).unwrap();
        assert_eq!(l.node.object, 0);
        assert_eq!(l.node.native, NO_TAG);
    }
}
