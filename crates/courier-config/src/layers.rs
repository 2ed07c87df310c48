//! Layer stacking for the configuration tree.
//!
//! Every leaf of the stacked tree remembers the [`Layer`] that wrote it
//! last. Environment fallbacks read that record so they never touch a key a
//! config file set.

use std::collections::BTreeMap;
use std::fmt;

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// The embedded `defaults.toml`.
    Defaults,
    /// `~/.courier/config.toml`.
    User,
    /// `{workspace}/.courier/config.toml`.
    Workspace,
    /// A `COURIER_*` environment variable.
    Env,
}

impl Layer {
    /// Whether this layer is a config file on disk.
    #[must_use]
    pub fn is_file(self) -> bool {
        matches!(self, Self::User | Self::Workspace)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::User => "user",
            Self::Workspace => "workspace",
            Self::Env => "env",
        })
    }
}

/// Dotted key (`"bus.strategy"`) to the layer that last wrote it.
pub type Origins = BTreeMap<String, Layer>;

/// Configuration tree built up one layer at a time.
#[derive(Debug, Clone, Default)]
pub struct LayeredTree {
    root: toml::Table,
    origins: Origins,
}

impl LayeredTree {
    /// Start a tree from the defaults table.
    #[must_use]
    pub fn new(defaults: toml::Table) -> Self {
        let mut tree = Self::default();
        tree.stack(Layer::Defaults, defaults);
        tree
    }

    /// Put `overlay` on top of the tree.
    ///
    /// Tables present on both sides merge key by key. Any other value,
    /// arrays included, replaces whatever was below it.
    pub fn stack(&mut self, layer: Layer, overlay: toml::Table) {
        let mut path = Vec::new();
        stack_into(&mut self.root, overlay, layer, &mut path, &mut self.origins);
    }

    /// Write a single dotted key, creating the tables on the way.
    ///
    /// Does nothing when a segment on the way holds a non-table value.
    pub fn set(&mut self, layer: Layer, key: &str, value: toml::Value) {
        let mut segments = key.split('.');
        let Some(leaf) = segments.next_back() else {
            return;
        };
        let mut table = &mut self.root;
        for segment in segments {
            let Some(next) = table
                .entry(segment)
                .or_insert_with(|| toml::Value::Table(toml::Table::new()))
                .as_table_mut()
            else {
                return;
            };
            table = next;
        }
        forget_below(&mut self.origins, key);
        record(&value, key, layer, &mut self.origins);
        table.insert(leaf.to_owned(), value);
    }

    /// Layer that last wrote `key`.
    #[must_use]
    pub fn origin(&self, key: &str) -> Option<Layer> {
        self.origins.get(key).copied()
    }

    /// Split into the merged table and the per-key origins.
    #[must_use]
    pub fn into_parts(self) -> (toml::Table, Origins) {
        (self.root, self.origins)
    }
}

fn stack_into(
    below: &mut toml::Table,
    overlay: toml::Table,
    layer: Layer,
    path: &mut Vec<String>,
    origins: &mut Origins,
) {
    for (key, value) in overlay {
        path.push(key.clone());
        match value {
            toml::Value::Table(above) if matches!(below.get(&key), Some(toml::Value::Table(_))) => {
                if let Some(toml::Value::Table(inner)) = below.get_mut(&key) {
                    stack_into(inner, above, layer, path, origins);
                }
            },
            value => {
                let dotted = path.join(".");
                forget_below(origins, &dotted);
                record(&value, &dotted, layer, origins);
                below.insert(key, value);
            },
        }
        path.pop();
    }
}

/// Drop the origins of `key` and of everything nested under it.
fn forget_below(origins: &mut Origins, key: &str) {
    origins.retain(|known, _| {
        known != key
            && !known
                .strip_prefix(key)
                .is_some_and(|rest| rest.starts_with('.'))
    });
}

fn record(value: &toml::Value, key: &str, layer: Layer, origins: &mut Origins) {
    match value {
        toml::Value::Table(table) => {
            for (child, nested) in table {
                record(nested, &format!("{key}.{child}"), layer, origins);
            }
        },
        _ => {
            origins.insert(key.to_owned(), layer);
        },
    }
}
