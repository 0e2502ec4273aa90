use std::collections::BTreeMap;

use crate::visibility::{DefaultVisibility, VariantEntry, VisibilityConfig, variant_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshAction {
    /// `s<N>`: shown only in variant N.
    Show,
    /// `h<N>`: hidden in variant N.
    Hide,
    /// `c<N>`: handled by the variant's hook.
    Conditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshTag {
    pub action: MeshAction,
    pub index: u32,
}

/// Parses one `-`-separated token of a mesh name (`s3`, `h12`, `c0`).
pub fn parse_mesh_tag(token: &str) -> Option<MeshTag> {
    let mut chars = token.chars();
    let action = match chars.next()? {
        's' => MeshAction::Show,
        'h' => MeshAction::Hide,
        'c' => MeshAction::Conditional,
        _ => return None,
    };
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    Some(MeshTag { action, index })
}

#[derive(Default)]
struct EntryBuilder {
    add: Vec<String>,
    delete: Vec<String>,
    conditional: Vec<String>,
}

impl EntryBuilder {
    fn push(&mut self, action: MeshAction, name: &str) {
        let list = match action {
            MeshAction::Show => &mut self.add,
            MeshAction::Hide => &mut self.delete,
            MeshAction::Conditional => &mut self.conditional,
        };
        if !list.iter().any(|existing| existing == name) {
            list.push(name.to_string());
        }
    }

    fn finish(self) -> VariantEntry {
        VariantEntry {
            add: Some(self.add),
            delete: Some(self.delete),
            conditional: self.conditional,
        }
    }
}

/// Builds a visibility config from the hallway's mesh names.
///
/// A mesh with no tag, or with any hide tag, is part of the default-visible
/// list; tagged meshes are filed under every variant their tags name.
pub fn generate_config<'a, I>(mesh_names: I) -> VisibilityConfig
where
    I: IntoIterator<Item = &'a str>,
{
    let mut visible = Vec::new();
    let mut entries: BTreeMap<u32, EntryBuilder> = BTreeMap::new();

    for name in mesh_names {
        let mut tagged = false;
        let mut hidden_somewhere = false;
        for tag in name.split('-').filter_map(parse_mesh_tag) {
            tagged = true;
            if tag.action == MeshAction::Hide {
                hidden_somewhere = true;
            }
            entries.entry(tag.index).or_default().push(tag.action, name);
        }
        if !tagged || hidden_somewhere {
            visible.push(name.to_string());
        }
    }

    let variants = entries
        .into_iter()
        .map(|(index, builder)| (variant_key(index as i32), builder.finish()))
        .collect();

    VisibilityConfig {
        default: DefaultVisibility { visible },
        variants,
    }
}
