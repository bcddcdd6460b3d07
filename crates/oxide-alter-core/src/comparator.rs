//! Model comparator.
//!
//! Compares a source and a target [`Database`] and produces the ordered
//! list of [`Change`]s that turns the source into the target. Every change
//! is applied to a working copy of the source (the intermediate model) as
//! soon as it is decided, so later phases see the effect of earlier ones.
//!
//! Phases, in output order:
//!
//! 1. removed tables, each preceded by the removal of foreign keys of
//!    other tables pointing at it;
//! 2. removed foreign keys of kept tables (gone, changed, or touching a
//!    changed column on either side);
//! 3. removed indexes of kept tables (gone, changed, or covering a changed
//!    column);
//! 4. added tables, with columns, primary key and indexes;
//! 5. column and primary key changes of kept tables;
//! 6. added indexes of kept tables;
//! 7. added foreign keys of kept and added tables.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::change::{table_pattern, Change};
use crate::error::Result;
use crate::model::{fold, Column, Database, ForeignKey, Table};
use crate::platform::{Platform, PlatformInfo};

/// Result of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Ordered changes turning the source into the target.
    pub changes: Vec<Change>,
    /// The source with every change applied.
    pub intermediate: Database,
}

impl Comparison {
    /// Returns true if the models were already equivalent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Computes the changes between two models for a platform.
#[derive(Debug, Clone, Copy)]
pub struct ModelComparator<'a> {
    platform: &'a Platform,
    case_sensitive: bool,
}

/// Working state of one comparison.
struct Run<'m> {
    source: &'m Database,
    target: &'m Database,
    intermediate: Database,
    changes: Vec<Change>,
    case_sensitive: bool,
    /// Removed or modified columns of kept tables, keyed by folded names.
    changed_columns: HashMap<String, HashSet<String>>,
    /// Kept tables whose primary key column set changes.
    primary_key_changed: HashSet<String>,
}

impl<'m> Run<'m> {
    fn push(&mut self, change: Change) -> Result<()> {
        change.apply(&mut self.intermediate, self.case_sensitive)?;
        debug!(change = %change.description(), "Computed change");
        self.changes.push(change);
        Ok(())
    }

    fn key(&self, name: &str) -> String {
        fold(name, self.case_sensitive)
    }

    fn is_changed_column(&self, table: &str, column: &str) -> bool {
        self.changed_columns
            .get(&self.key(table))
            .is_some_and(|columns| columns.contains(&self.key(column)))
    }

    /// Kept tables as `(source, target)` pairs, in source order.
    fn kept_tables(&self) -> Vec<(&'m Table, &'m Table)> {
        let target = self.target;
        let cs = self.case_sensitive;
        self.source
            .tables
            .iter()
            .filter_map(|s| target.find_table(&s.name, cs).map(|t| (s, t)))
            .collect()
    }
}

impl<'a> ModelComparator<'a> {
    /// Creates a comparator for `platform`.
    #[must_use]
    pub const fn new(platform: &'a Platform, case_sensitive: bool) -> Self {
        Self {
            platform,
            case_sensitive,
        }
    }

    /// Compares `source` with `target`.
    ///
    /// Both models are validated first; a structural error aborts the
    /// comparison before any change is computed.
    pub fn compare(&self, source: &Database, target: &Database) -> Result<Comparison> {
        source.validate(self.case_sensitive)?;
        target.validate(self.case_sensitive)?;

        let mut run = Run {
            source,
            target,
            intermediate: source.clone(),
            changes: Vec::new(),
            case_sensitive: self.case_sensitive,
            changed_columns: HashMap::new(),
            primary_key_changed: HashSet::new(),
        };
        self.collect_changed_columns(&mut run);

        self.remove_tables(&mut run)?;
        self.remove_foreign_keys(&mut run)?;
        self.remove_indexes(&mut run)?;
        self.add_tables(&mut run)?;
        self.alter_columns(&mut run)?;
        self.add_indexes(&mut run)?;
        self.add_foreign_keys(&mut run)?;

        info!(
            platform = %self.platform.name(),
            changes = run.changes.len(),
            "Compared models"
        );

        Ok(Comparison {
            changes: run.changes,
            intermediate: run.intermediate,
        })
    }

    fn info(&self) -> &PlatformInfo {
        self.platform.info()
    }

    // ---- Preparation -------------------------------------------

    fn collect_changed_columns(&self, run: &mut Run<'_>) {
        for (source, target) in run.kept_tables() {
            let changed: HashSet<String> = source
                .columns
                .iter()
                .filter(|column| {
                    target
                        .find_column(&column.name, run.case_sensitive)
                        .map_or(true, |t| self.diff_column(&source.name, column, t).is_some())
                })
                .map(|column| run.key(&column.name))
                .collect();

            let key = run.key(&source.name);
            if !changed.is_empty() {
                run.changed_columns.insert(key.clone(), changed);
            }
            if !self.same_primary_key(source, target) {
                run.primary_key_changed.insert(key);
            }
        }
    }

    // ---- Phase 1: removed tables -------------------------------

    fn remove_tables(&self, run: &mut Run<'_>) -> Result<()> {
        let (source, target) = (run.source, run.target);
        let removed: Vec<&Table> = source
            .tables
            .iter()
            .filter(|t| target.find_table(&t.name, run.case_sensitive).is_none())
            .collect();

        for table in removed {
            let incoming = run
                .intermediate
                .foreign_keys_referencing(&table.name, run.case_sensitive);
            for (owner, foreign_key) in incoming {
                run.push(Change::RemoveForeignKey {
                    table: owner,
                    foreign_key,
                })?;
            }
            run.push(Change::RemoveTable {
                table: table.name.clone(),
            })?;
        }
        Ok(())
    }

    // ---- Phase 2: removed foreign keys -------------------------

    fn remove_foreign_keys(&self, run: &mut Run<'_>) -> Result<()> {
        for (source, target) in run.kept_tables() {
            let Some(current) = run.intermediate.find_table(&source.name, run.case_sensitive)
            else {
                continue;
            };
            let unmatched = unmatched_foreign_keys(
                &current.foreign_keys,
                &target.foreign_keys,
                run.case_sensitive,
            );

            let removed: Vec<ForeignKey> = current
                .foreign_keys
                .iter()
                .enumerate()
                .filter(|(i, fk)| {
                    unmatched.contains(i) || self.touches_changed_column(run, &source.name, fk)
                })
                .map(|(_, fk)| fk.clone())
                .collect();

            for foreign_key in removed {
                run.push(Change::RemoveForeignKey {
                    table: source.name.clone(),
                    foreign_key,
                })?;
            }
        }
        Ok(())
    }

    fn touches_changed_column(&self, run: &Run<'_>, table: &str, fk: &ForeignKey) -> bool {
        let foreign_primary_key_changed =
            run.primary_key_changed.contains(&run.key(&fk.foreign_table));
        foreign_primary_key_changed
            || fk.references.iter().any(|r| {
                run.is_changed_column(table, &r.local_column)
                    || run.is_changed_column(&fk.foreign_table, &r.foreign_column)
            })
    }

    // ---- Phase 3: removed indexes ------------------------------

    fn remove_indexes(&self, run: &mut Run<'_>) -> Result<()> {
        for (source, target) in run.kept_tables() {
            let Some(current) = run.intermediate.find_table(&source.name, run.case_sensitive)
            else {
                continue;
            };

            let removed: Vec<_> = current
                .indexes
                .iter()
                .filter(|index| {
                    let unchanged = target
                        .find_index(index, run.case_sensitive)
                        .is_some_and(|t| t.same_definition(index, run.case_sensitive));
                    !unchanged
                        || index
                            .columns
                            .iter()
                            .any(|c| run.is_changed_column(&source.name, &c.name))
                })
                .cloned()
                .collect();

            for index in removed {
                run.push(Change::RemoveIndex {
                    table: source.name.clone(),
                    index,
                })?;
            }
        }
        Ok(())
    }

    // ---- Phase 4: added tables ---------------------------------

    fn add_tables(&self, run: &mut Run<'_>) -> Result<()> {
        let (source, target) = (run.source, run.target);
        let added: Vec<&Table> = target
            .tables
            .iter()
            .filter(|t| source.find_table(&t.name, run.case_sensitive).is_none())
            .collect();

        for table in added {
            let mut definition = table.clone();
            definition.foreign_keys.clear();
            run.push(Change::AddTable { table: definition })?;
        }
        Ok(())
    }

    // ---- Phase 5: columns and primary keys ---------------------

    fn alter_columns(&self, run: &mut Run<'_>) -> Result<()> {
        for (source, target) in run.kept_tables() {
            let cs = run.case_sensitive;
            let table_name = source.name.clone();

            // Dropped key columns stay until the key itself has changed.
            let (dropped_keys, dropped): (Vec<&Column>, Vec<&Column>) = source
                .columns
                .iter()
                .filter(|c| target.find_column(&c.name, cs).is_none())
                .partition(|c| c.primary_key);
            for column in dropped {
                run.push(Change::RemoveColumn {
                    table: table_name.clone(),
                    column: column.name.clone(),
                })?;
            }

            for (position, column) in target.columns.iter().enumerate() {
                if source.find_column(&column.name, cs).is_some() {
                    continue;
                }
                let mut column = column.clone();
                column.primary_key = false;
                run.push(Change::AddColumn {
                    table: table_name.clone(),
                    column,
                    previous_column: position
                        .checked_sub(1)
                        .map(|p| target.columns[p].name.clone()),
                    next_column: target.columns.get(position + 1).map(|c| c.name.clone()),
                })?;
            }

            for column in &target.columns {
                let Some(existing) = source.find_column(&column.name, cs) else {
                    continue;
                };
                if let Some(change) = self.diff_column(&table_name, existing, column) {
                    run.push(change)?;
                }
            }

            if run.primary_key_changed.contains(&run.key(&table_name)) {
                let change = Change::PrimaryKeyChange {
                    table: table_name.clone(),
                    old_columns: source.primary_key_names(),
                    new_columns: target.primary_key_names(),
                };
                run.push(change)?;
            }

            for column in dropped_keys {
                run.push(Change::RemoveColumn {
                    table: table_name.clone(),
                    column: column.name.clone(),
                })?;
            }
        }
        Ok(())
    }

    /// Returns the narrowest change turning `from` into `to`, or `None`
    /// when they are the same on this platform. Primary key membership is
    /// not considered.
    fn diff_column(&self, table: &str, from: &Column, to: &Column) -> Option<Change> {
        let info = self.info();
        let type_changed = info.target_type(from.type_code) != info.target_type(to.type_code);
        let size_changed = !type_changed && self.size_differs(from, to);
        let required_changed = info.is_required(from) != info.is_required(to);
        let default_changed =
            from.parsed_default_as(to.type_code) != to.parsed_default_as(to.type_code);
        let auto_increment_changed = from.auto_increment != to.auto_increment;

        let differences = [
            type_changed,
            size_changed,
            required_changed,
            default_changed,
            auto_increment_changed,
        ]
        .iter()
        .filter(|d| **d)
        .count();

        let table = table.to_string();
        let column = from.name.clone();
        match differences {
            0 => None,
            1 if size_changed => Some(Change::ColumnSizeChange {
                table,
                column,
                new_size: to.size,
                new_scale: to.scale,
            }),
            1 if default_changed => Some(Change::ColumnDefaultValueChange {
                table,
                column,
                new_default: to.default_value.clone(),
            }),
            1 if auto_increment_changed => Some(Change::ColumnAutoIncrementChange {
                table,
                column,
                auto_increment: to.auto_increment,
            }),
            _ => Some(Change::ColumnDefinitionChange {
                table,
                column,
                new_definition: to.clone(),
            }),
        }
    }

    fn size_differs(&self, from: &Column, to: &Column) -> bool {
        let info = self.info();
        let native = info.target_type(to.type_code);
        if native.has_size() {
            info.effective_size(from) != info.effective_size(to)
        } else if native.has_precision_and_scale() {
            info.effective_size(from) != info.effective_size(to) || from.scale != to.scale
        } else {
            false
        }
    }

    fn same_primary_key(&self, a: &Table, b: &Table) -> bool {
        let cs = self.case_sensitive;
        let keys = |t: &Table| -> HashSet<String> {
            t.primary_key_columns()
                .iter()
                .map(|c| fold(&c.name, cs))
                .collect()
        };
        keys(a) == keys(b)
    }

    // ---- Phase 6: added indexes --------------------------------

    fn add_indexes(&self, run: &mut Run<'_>) -> Result<()> {
        for (source, target) in run.kept_tables() {
            for index in &target.indexes {
                let exists = run
                    .intermediate
                    .find_table(&source.name, run.case_sensitive)
                    .and_then(|t| t.find_index(index, run.case_sensitive))
                    .is_some();
                if !exists {
                    run.push(Change::AddIndex {
                        table: source.name.clone(),
                        index: index.clone(),
                    })?;
                }
            }
        }
        Ok(())
    }

    // ---- Phase 7: added foreign keys ---------------------------

    fn add_foreign_keys(&self, run: &mut Run<'_>) -> Result<()> {
        let target_model = run.target;
        for target in &target_model.tables {
            let current = run
                .intermediate
                .require_table(&target.name, run.case_sensitive)?;
            let unmatched = unmatched_foreign_keys(
                &target.foreign_keys,
                &current.foreign_keys,
                run.case_sensitive,
            );
            // The owning table keeps its source spelling when matched
            // case-insensitively.
            let owner = current.name.clone();

            for i in unmatched {
                run.push(Change::AddForeignKey {
                    table: owner.clone(),
                    foreign_key: target.foreign_keys[i].clone(),
                })?;
            }
        }
        Ok(())
    }
}

/// Indices of the keys in `keys` without a structural counterpart in
/// `others`, pairing keys one to one so duplicates are counted.
fn unmatched_foreign_keys(
    keys: &[ForeignKey],
    others: &[ForeignKey],
    case_sensitive: bool,
) -> Vec<usize> {
    let mut used = vec![false; others.len()];
    keys.iter()
        .enumerate()
        .filter_map(|(i, fk)| {
            let matched = others
                .iter()
                .enumerate()
                .position(|(j, other)| !used[j] && other.same_structure(fk, case_sensitive));
            match matched {
                Some(j) => {
                    used[j] = true;
                    None
                }
                None => Some(i),
            }
        })
        .collect()
}

/// Changes removing every table whose name matches `pattern`.
///
/// Foreign keys of the remaining tables that point at a matching table
/// are removed first, followed by one [`Change::RemoveTables`].
pub fn remove_tables_matching(
    model: &Database,
    pattern: &str,
    case_sensitive: bool,
) -> Result<Vec<Change>> {
    let regex = table_pattern(pattern, case_sensitive)?;
    let (matching, remaining): (Vec<&Table>, Vec<&Table>) =
        model.tables.iter().partition(|t| regex.is_match(&t.name));

    let mut changes: Vec<Change> = remaining
        .iter()
        .flat_map(|table| {
            table
                .foreign_keys
                .iter()
                .filter(|fk| {
                    matching
                        .iter()
                        .any(|m| fk.references_table(&m.name, case_sensitive))
                })
                .map(|fk| Change::RemoveForeignKey {
                    table: table.name.clone(),
                    foreign_key: fk.clone(),
                })
        })
        .collect();

    info!(
        pattern = %pattern,
        tables = matching.len(),
        foreign_keys = changes.len(),
        "Removing tables by pattern"
    );
    changes.push(Change::RemoveTables {
        pattern: pattern.to_string(),
    });
    Ok(changes)
}
