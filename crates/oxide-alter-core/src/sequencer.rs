//! Alteration sequencer.
//!
//! Turns the comparator's change list into an executable plan. Column and
//! primary key changes are grouped per table and submitted to the
//! platform predicate; groups the platform cannot apply in place are
//! replaced by a [`TableRecreation`]. The sequencer also takes care of
//! everything a recreation implies: constraints of the table and foreign
//! keys pointing at it are dropped first and restored afterwards.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::change::{Change, ChangeKind};
use crate::comparator::ModelComparator;
use crate::error::{AlterError, Result};
use crate::model::{fold, Database, ForeignKey, Table};
use crate::platform::Platform;
use crate::recreation::{AlterationWarning, TableRecreation};

/// One step of an alteration plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PlanStep {
    /// A change applied directly.
    Change(Change),
    /// A table rebuilt from scratch.
    Recreate(TableRecreation),
}

impl PlanStep {
    /// Applies this step to a model.
    pub fn apply(&self, model: &mut Database, case_sensitive: bool) -> Result<()> {
        match self {
            Self::Change(change) => change.apply(model, case_sensitive),
            Self::Recreate(recreation) => recreation.apply(model, case_sensitive),
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Change(change) => change.description(),
            Self::Recreate(recreation) => {
                format!("Recreate table '{}'", recreation.table_name())
            }
        }
    }
}

/// Ordered plan produced by the sequencer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlterationPlan {
    /// Steps, in execution order.
    pub steps: Vec<PlanStep>,
    /// Data warnings raised by recreations.
    pub warnings: Vec<AlterationWarning>,
}

impl AlterationPlan {
    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Recreations in this plan.
    pub fn recreations(&self) -> impl Iterator<Item = &TableRecreation> {
        self.steps.iter().filter_map(|step| match step {
            PlanStep::Recreate(recreation) => Some(recreation),
            PlanStep::Change(_) => None,
        })
    }

    /// Replays the plan on a model.
    pub fn apply(&self, model: &mut Database, case_sensitive: bool) -> Result<()> {
        for step in &self.steps {
            step.apply(model, case_sensitive)?;
        }
        Ok(())
    }
}

/// Definition changes of one table.
struct Group {
    table: String,
    /// Position of the first change of the group in the change list.
    position: usize,
    /// The table just before its first definition change.
    before: Table,
    changes: Vec<Change>,
}

/// Orders changes and decides between in-place alteration and recreation.
#[derive(Debug, Clone, Copy)]
pub struct AlterationSequencer<'a> {
    platform: &'a Platform,
    case_sensitive: bool,
}

impl<'a> AlterationSequencer<'a> {
    /// Creates a sequencer for `platform`.
    #[must_use]
    pub const fn new(platform: &'a Platform, case_sensitive: bool) -> Self {
        Self {
            platform,
            case_sensitive,
        }
    }

    /// Builds the plan executing `changes` against `source`.
    ///
    /// `changes` must apply cleanly to `source` in order, as the
    /// comparator's output does.
    pub fn sequence(&self, source: &Database, changes: Vec<Change>) -> Result<AlterationPlan> {
        let cs = self.case_sensitive;
        let key = |name: &str| fold(name, cs);
        let info = self.platform.info();

        // ---- Replay: table states and definition groups ------------
        let mut replay = source.clone();
        let mut groups: Vec<Group> = Vec::new();
        let mut inline_tables: HashSet<String> = HashSet::new();
        let mut absorbed: HashSet<usize> = HashSet::new();

        for (position, change) in changes.iter().enumerate() {
            if change.is_table_definition_change() {
                if let Some(table) = change.table_name() {
                    match groups.iter_mut().find(|g| key(&g.table) == key(table)) {
                        Some(group) => group.changes.push(change.clone()),
                        None => groups.push(Group {
                            table: table.to_string(),
                            position,
                            before: replay.require_table(table, cs)?.clone(),
                            changes: vec![change.clone()],
                        }),
                    }
                }
            }
            if let Change::AddTable { table } = change {
                if !info.supports_foreign_key_alteration {
                    let folded = self.foldable_foreign_keys(&replay, table, &changes);
                    if let Some(positions) = folded {
                        inline_tables.insert(key(&table.name));
                        absorbed.extend(positions);
                    }
                }
            }
            change.apply(&mut replay, cs)?;
        }
        let target = replay;

        // ---- Decide recreations ------------------------------------
        let mut recreations: HashMap<String, usize> = HashMap::new();
        for group in &groups {
            if self
                .platform
                .predicate()
                .are_supported(&group.before, &group.changes)
            {
                debug!(
                    table = %group.table,
                    changes = group.changes.len(),
                    "Altering table in place"
                );
                continue;
            }
            if !info.supports_table_recreation {
                return Err(self.unsupported(group));
            }
            warn!(
                table = %group.table,
                platform = %self.platform.name(),
                "Changes not supported in place, recreating table"
            );
            recreations.insert(key(&group.table), group.position);
        }
        if !info.supports_foreign_key_alteration {
            self.foreign_key_recreations(&changes, &target, &inline_tables, &mut recreations)?;
        }

        // ---- Emit --------------------------------------------------
        let mut working = source.clone();
        let mut plan = AlterationPlan::default();

        for (position, change) in changes.into_iter().enumerate() {
            let owner = change.table_name().map(key);
            let recreation = owner.as_ref().and_then(|k| recreations.get(k)).copied();

            if let Some(start) = recreation {
                if start == position {
                    let table = change.table_name().unwrap_or_default().to_string();
                    self.recreate(&table, &target, &mut working, &mut plan)?;
                    continue;
                }
                if absorbed_by_recreation(&change, position, start) {
                    debug!(change = %change.description(), "Absorbed by table recreation");
                    continue;
                }
            }
            if absorbed.contains(&position) || already_removed(&change, &working, cs) {
                continue;
            }

            let change = match change {
                Change::AddTable { mut table } if inline_tables.contains(&key(&table.name)) => {
                    if let Some(t) = target.find_table(&table.name, cs) {
                        table.foreign_keys = t.foreign_keys.clone();
                    }
                    Change::AddTable { table }
                }
                other => other,
            };
            self.push(change, &mut working, &mut plan)?;
        }

        // ---- Restore foreign keys dropped for recreations ----------
        for table in &target.tables {
            let Some(current) = working.find_table(&table.name, cs) else {
                continue;
            };
            let mut present: Vec<Option<&ForeignKey>> =
                current.foreign_keys.iter().map(Some).collect();
            let mut missing = Vec::new();
            for fk in &table.foreign_keys {
                match present
                    .iter_mut()
                    .find(|p| p.is_some_and(|p| p.same_structure(fk, cs)))
                {
                    Some(slot) => *slot = None,
                    None => missing.push(Change::AddForeignKey {
                        table: current.name.clone(),
                        foreign_key: fk.clone(),
                    }),
                }
            }
            for change in missing {
                self.push(change, &mut working, &mut plan)?;
            }
        }

        info!(
            platform = %self.platform.name(),
            steps = plan.steps.len(),
            recreations = plan.recreations().count(),
            warnings = plan.warnings.len(),
            "Sequenced alteration plan"
        );
        Ok(plan)
    }

    fn push(
        &self,
        change: Change,
        working: &mut Database,
        plan: &mut AlterationPlan,
    ) -> Result<()> {
        change.apply(working, self.case_sensitive)?;
        plan.steps.push(PlanStep::Change(change));
        Ok(())
    }

    /// Emits the recreation of `table`, preceded by the removal of its
    /// constraints and of the foreign keys pointing at it.
    fn recreate(
        &self,
        table: &str,
        target: &Database,
        working: &mut Database,
        plan: &mut AlterationPlan,
    ) -> Result<()> {
        let cs = self.case_sensitive;
        let current = working.require_table(table, cs)?.clone();

        let mut removals: Vec<Change> = current
            .indexes
            .iter()
            .map(|index| Change::RemoveIndex {
                table: current.name.clone(),
                index: index.clone(),
            })
            .collect();
        removals.extend(current.foreign_keys.iter().map(|fk| Change::RemoveForeignKey {
            table: current.name.clone(),
            foreign_key: fk.clone(),
        }));
        removals.extend(
            working
                .foreign_keys_referencing(&current.name, cs)
                .into_iter()
                .map(|(owner, foreign_key)| Change::RemoveForeignKey {
                    table: owner,
                    foreign_key,
                }),
        );
        for change in removals {
            self.push(change, working, plan)?;
        }

        let old = working.require_table(table, cs)?.clone();
        let mut new = target.require_table(table, cs)?.clone();
        let shape = new.without_constraints();
        // Keys whose target is not ready yet are restored at the end.
        new.foreign_keys.retain(|fk| {
            let resolvable = |t: &Table| {
                fk.references
                    .iter()
                    .all(|r| t.find_column(&r.foreign_column, cs).is_some())
            };
            if fk.references_table(&shape.name, cs) {
                resolvable(&shape)
            } else {
                working
                    .find_table(&fk.foreign_table, cs)
                    .is_some_and(resolvable)
            }
        });

        let recreation = TableRecreation::new(&old, &new, self.platform.info(), working, cs);
        recreation.apply(working, cs)?;
        info!(
            table = %recreation.table_name(),
            temporary = %recreation.temporary_name,
            columns = recreation.copies.len(),
            "Recreating table"
        );
        plan.warnings.extend(recreation.warnings().iter().cloned());
        plan.steps.push(PlanStep::Recreate(recreation));
        Ok(())
    }

    /// On platforms that cannot add foreign keys to a new table later,
    /// returns the positions of the table's foreign key additions when
    /// they can be declared with the table itself.
    fn foldable_foreign_keys(
        &self,
        model: &Database,
        table: &Table,
        changes: &[Change],
    ) -> Option<Vec<usize>> {
        let cs = self.case_sensitive;
        let mut positions = Vec::new();
        for (position, change) in changes.iter().enumerate() {
            let Change::AddForeignKey {
                table: owner,
                foreign_key,
            } = change
            else {
                continue;
            };
            if fold(owner, cs) != fold(&table.name, cs) {
                continue;
            }
            let foreign = if foreign_key.references_table(&table.name, cs) {
                Some(table)
            } else {
                model.find_table(&foreign_key.foreign_table, cs)
            };
            let resolvable = foreign.is_some_and(|t| {
                foreign_key
                    .references
                    .iter()
                    .all(|r| t.find_column(&r.foreign_column, cs).is_some())
            });
            if !resolvable {
                return None;
            }
            positions.push(position);
        }
        Some(positions)
    }

    /// Tables whose foreign keys change on a platform that can only
    /// declare them with the table. Each such table is recreated at its
    /// first definition change, else its first index or foreign key
    /// addition, else its last removal.
    fn foreign_key_recreations(
        &self,
        changes: &[Change],
        target: &Database,
        inline_tables: &HashSet<String>,
        recreations: &mut HashMap<String, usize>,
    ) -> Result<()> {
        let cs = self.case_sensitive;
        let mut touched: Vec<String> = Vec::new();
        for change in changes {
            let (Change::AddForeignKey { table, .. } | Change::RemoveForeignKey { table, .. }) =
                change
            else {
                continue;
            };
            let k = fold(table, cs);
            let skip = recreations.contains_key(&k)
                || touched.contains(&k)
                || target.find_table(table, cs).is_none()
                || (change.kind() == ChangeKind::AddForeignKey && inline_tables.contains(&k));
            if skip {
                continue;
            }
            if !self.platform.info().supports_table_recreation {
                return Err(AlterError::UnsupportedChange {
                    category: change.kind(),
                    table: table.clone(),
                    platform: self.platform.name().to_string(),
                });
            }
            touched.push(k);
        }

        for k in touched {
            let of_table = |c: &Change| c.table_name().is_some_and(|t| fold(t, cs) == k);
            let first_definition = changes
                .iter()
                .position(|c| c.is_table_definition_change() && of_table(c));
            let first_addition = changes
                .iter()
                .position(|c| c.is_constraint_addition() && of_table(c));
            let last_change = changes.iter().rposition(of_table);
            if let Some(position) = first_definition.or(first_addition).or(last_change) {
                warn!(
                    table = %k,
                    platform = %self.platform.name(),
                    "Foreign keys cannot be altered in place, recreating table"
                );
                recreations.insert(k, position);
            }
        }
        Ok(())
    }

    fn unsupported(&self, group: &Group) -> AlterError {
        let predicate = self.platform.predicate();
        let category = group
            .changes
            .iter()
            .find(|c| !predicate.are_supported(&group.before, std::slice::from_ref(*c)))
            .or_else(|| group.changes.first())
            .map_or(ChangeKind::ColumnDefinitionChange, Change::kind);
        AlterError::UnsupportedChange {
            category,
            table: group.table.clone(),
            platform: self.platform.name().to_string(),
        }
    }
}

/// Whether `change`, found at `position`, is covered by the recreation of
/// its table starting at `start`.
fn absorbed_by_recreation(change: &Change, position: usize, start: usize) -> bool {
    match change.kind() {
        ChangeKind::AddTable | ChangeKind::RemoveTable | ChangeKind::RemoveTables => false,
        ChangeKind::RemoveIndex | ChangeKind::RemoveForeignKey => position > start,
        _ => true,
    }
}

/// Whether a constraint removal targets a constraint an earlier
/// recreation already dropped.
fn already_removed(change: &Change, working: &Database, case_sensitive: bool) -> bool {
    match change {
        Change::RemoveIndex { table, index } => working
            .find_table(table, case_sensitive)
            .is_some_and(|t| t.find_index(index, case_sensitive).is_none()),
        Change::RemoveForeignKey { table, foreign_key } => working
            .find_table(table, case_sensitive)
            .is_some_and(|t| t.find_foreign_key(foreign_key, case_sensitive).is_none()),
        _ => false,
    }
}

/// Compares `source` with `target` and sequences the result.
pub fn plan(
    source: &Database,
    target: &Database,
    platform: &Platform,
    case_sensitive: bool,
) -> Result<AlterationPlan> {
    let comparison = ModelComparator::new(platform, case_sensitive).compare(source, target)?;
    AlterationSequencer::new(platform, case_sensitive).sequence(source, comparison.changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Index, JdbcType};
    use crate::platform::PlatformInfo;
    use crate::predicate::DefaultTableDefinitionChangesPredicate;
    use crate::recreation::CopySource;

    fn users(name_size: u32) -> Table {
        Table::new("users")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("name", JdbcType::VarChar).size(name_size))
            .index(Index::new("idx_users_name", ["name"]))
    }

    fn posts() -> Table {
        Table::new("posts")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("author", JdbcType::Integer))
            .foreign_key(ForeignKey::new("users").reference("author", "id"))
    }

    fn descriptions(plan: &AlterationPlan) -> Vec<String> {
        plan.steps.iter().map(PlanStep::description).collect()
    }

    #[test]
    fn in_place_changes_stay_direct() {
        let source = Database::new("app").table(users(50));
        let target = Database::new("app").table(
            users(50).column(Column::new("email", JdbcType::VarChar).size(80)),
        );
        let plan = plan(&source, &target, &Platform::generic(), true).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.recreations().count(), 0);
    }

    #[test]
    fn rejected_group_becomes_recreation() {
        let source = Database::new("app").table(users(10)).table(posts());
        let target = Database::new("app").table(users(50)).table(posts());
        let plan = plan(&source, &target, &Platform::generic(), true).unwrap();

        assert_eq!(
            descriptions(&plan),
            vec![
                "Remove index 'idx_users_name' from table 'users'",
                "Remove foreign key 'fk_posts_author' from table 'posts'",
                "Recreate table 'users'",
                "Add foreign key 'fk_posts_author' to table 'posts'",
            ]
        );

        let recreation = plan.recreations().next().unwrap();
        assert!(matches!(
            &recreation.copies[1].source,
            CopySource::Column { conversion: Some(c), .. } if !c.lossy
        ));
        assert!(plan.warnings.is_empty());

        let mut replayed = source.clone();
        plan.apply(&mut replayed, true).unwrap();
        assert!(replayed.is_equivalent(&target, true));
    }

    #[test]
    fn unsupported_without_recreation() {
        let platform = Platform::new(
            PlatformInfo::new("rigid").without_table_recreation(),
            DefaultTableDefinitionChangesPredicate::new(),
        );
        let source = Database::new("app").table(users(10));
        let target = Database::new("app").table(users(50));
        let err = plan(&source, &target, &platform, true).unwrap_err();
        assert_eq!(
            err,
            AlterError::UnsupportedChange {
                category: ChangeKind::ColumnSizeChange,
                table: "users".into(),
                platform: "rigid".into(),
            }
        );
    }

    #[test]
    fn sqlite_inlines_foreign_keys_of_new_tables() {
        let source = Database::new("app").table(users(50));
        let target = Database::new("app").table(users(50)).table(posts());
        let plan = plan(&source, &target, &Platform::sqlite(), true).unwrap();
        assert_eq!(plan.len(), 1);
        let PlanStep::Change(Change::AddTable { table }) = &plan.steps[0] else {
            panic!("expected AddTable");
        };
        assert_eq!(table.foreign_keys.len(), 1);
    }

    #[test]
    fn sqlite_recreates_table_for_new_foreign_key() {
        let plain_posts = Table::new("posts")
            .column(Column::new("id", JdbcType::Integer).primary_key())
            .column(Column::new("author", JdbcType::Integer));
        let source = Database::new("app").table(users(50)).table(plain_posts);
        let target = Database::new("app").table(users(50)).table(posts());

        let plan = plan(&source, &target, &Platform::sqlite(), true).unwrap();
        assert_eq!(descriptions(&plan), vec!["Recreate table 'posts'"]);

        let mut replayed = source.clone();
        plan.apply(&mut replayed, true).unwrap();
        assert!(replayed.is_equivalent(&target, true));
    }

    #[test]
    fn warnings_are_collected() {
        let source = Database::new("app").table(users(50));
        let target = Database::new("app").table(users(10));
        let plan = plan(&source, &target, &Platform::generic(), true).unwrap();
        assert!(matches!(
            plan.warnings.as_slice(),
            [AlterationWarning::LossyConversion { column, .. }] if column == "name"
        ));
    }
}
