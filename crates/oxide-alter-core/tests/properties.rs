//! Property tests for comparison and planning on every built-in platform.

use std::collections::BTreeMap;

use oxide_alter_core::prelude::*;
use proptest::prelude::*;

const TABLES: [&str; 4] = ["accounts", "orders", "items", "notes"];

#[derive(Debug, Clone)]
struct ColumnSpec {
    kind: u8,
    width: u32,
    required: bool,
    default: Option<u8>,
}

#[derive(Debug, Clone)]
struct TableSpec {
    columns: Vec<ColumnSpec>,
    composite_key: bool,
    indexes: Vec<(usize, bool)>,
    foreign_keys: Vec<(usize, usize)>,
}

fn column_spec() -> impl Strategy<Value = ColumnSpec> {
    (0u8..4, 1u32..5, any::<bool>(), proptest::option::of(0u8..3)).prop_map(
        |(kind, width, required, default)| ColumnSpec {
            kind,
            width,
            required,
            default,
        },
    )
}

fn table_spec() -> impl Strategy<Value = TableSpec> {
    (
        proptest::collection::vec(column_spec(), 0..4),
        any::<bool>(),
        proptest::collection::vec((0usize..4, any::<bool>()), 0..3),
        proptest::collection::vec((0usize..TABLES.len(), 0usize..4), 0..3),
    )
        .prop_map(|(columns, composite_key, indexes, foreign_keys)| TableSpec {
            columns,
            composite_key,
            indexes,
            foreign_keys,
        })
}

fn build_column(name: String, spec: &ColumnSpec) -> Column {
    let (column, defaults): (Column, [&str; 3]) = match spec.kind {
        0 => (Column::new(name, JdbcType::Integer), ["0", "1", "42"]),
        1 => (
            Column::new(name, JdbcType::VarChar).size(spec.width * 10),
            ["'a'", "'b'", "''"],
        ),
        2 => (
            Column::new(name, JdbcType::Decimal).precision(spec.width + 6, spec.width),
            ["0", "1.5", "2.25"],
        ),
        _ => (Column::new(name, JdbcType::Boolean), ["true", "false", "true"]),
    };
    let column = match spec.default {
        Some(i) => column.default_value(defaults[usize::from(i)]),
        None => column,
    };
    if spec.required {
        column.required()
    } else {
        column
    }
}

fn build_model(specs: &[Option<TableSpec>]) -> Database {
    let mut model = Database::new("db");
    for (i, spec) in specs.iter().enumerate() {
        let Some(spec) = spec else { continue };
        let name = TABLES[i];
        let mut table = Table::new(name).column(Column::new("id", JdbcType::Integer).primary_key());
        for (n, column) in spec.columns.iter().enumerate() {
            let mut column = build_column(format!("c{}", n + 1), column);
            if n == 0 && spec.composite_key {
                column = column.primary_key();
            }
            table = table.column(column);
        }

        let column_names: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        for (k, &(column, unique)) in spec.indexes.iter().enumerate() {
            let column = &column_names[column % column_names.len()];
            let index_name = format!("idx_{}_{}", name, k);
            table = table.index(if unique {
                Index::unique(index_name, [column.as_str()])
            } else {
                Index::new(index_name, [column.as_str()])
            });
        }

        let mut foreign_keys: BTreeMap<usize, ForeignKey> = BTreeMap::new();
        for &(target, local) in &spec.foreign_keys {
            if specs[target].is_none() {
                continue;
            }
            let local = &column_names[local % column_names.len()];
            foreign_keys
                .entry(target)
                .or_insert_with(|| ForeignKey::new(TABLES[target]).reference(local.as_str(), "id"));
        }
        for fk in foreign_keys.into_values() {
            table = table.foreign_key(fk);
        }
        model = model.table(table);
    }
    model
}

fn model() -> impl Strategy<Value = Database> {
    proptest::collection::vec(proptest::option::of(table_spec()), TABLES.len())
        .prop_map(|specs| build_model(&specs))
}

fn platform() -> impl Strategy<Value = Platform> {
    prop_oneof![
        Just(Platform::generic()),
        Just(Platform::sqlite()),
        Just(Platform::postgresql()),
    ]
}

/// Spells every identifier of `model` in upper case.
fn shouted(model: &Database) -> Database {
    let mut model = model.clone();
    for table in &mut model.tables {
        table.name = table.name.to_uppercase();
        for column in &mut table.columns {
            column.name = column.name.to_uppercase();
        }
        for index in &mut table.indexes {
            index.name = index.name.as_ref().map(|n| n.to_uppercase());
            for column in &mut index.columns {
                column.name = column.name.to_uppercase();
            }
        }
        for fk in &mut table.foreign_keys {
            fk.foreign_table = fk.foreign_table.to_uppercase();
            for reference in &mut fk.references {
                reference.local_column = reference.local_column.to_uppercase();
                reference.foreign_column = reference.foreign_column.to_uppercase();
            }
        }
    }
    model
}

/// The target as spelled for the case mode: upper case when names are
/// matched case-insensitively, so matching has to fold.
fn spelled(target: &Database, case_sensitive: bool) -> Database {
    if case_sensitive {
        target.clone()
    } else {
        shouted(target)
    }
}

proptest! {
    #[test]
    fn comparing_a_model_with_itself_is_empty(
        model in model(),
        platform in platform(),
        case_sensitive in any::<bool>(),
    ) {
        let comparator = ModelComparator::new(&platform, case_sensitive);
        let comparison = comparator.compare(&model, &model).unwrap();
        prop_assert!(comparison.is_empty(), "{:#?}", comparison.changes);

        let respelled = spelled(&model, case_sensitive);
        let comparison = comparator.compare(&model, &respelled).unwrap();
        prop_assert!(comparison.is_empty(), "{:#?}", comparison.changes);
    }

    #[test]
    fn applying_changes_reaches_the_target(
        source in model(),
        target in model(),
        platform in platform(),
        case_sensitive in any::<bool>(),
    ) {
        let cs = case_sensitive;
        let target = spelled(&target, cs);
        let comparator = ModelComparator::new(&platform, cs);
        let comparison = comparator.compare(&source, &target).unwrap();

        let mut result = source.clone();
        apply_all(&comparison.changes, &mut result, cs).unwrap();
        if platform.name() == "generic" {
            prop_assert!(result.is_equivalent(&target, cs));
            prop_assert!(comparison.intermediate.is_equivalent(&target, cs));
        }

        let again = comparator.compare(&result, &target).unwrap();
        prop_assert!(again.is_empty(), "{}: {:#?}", platform.name(), again.changes);
    }

    #[test]
    fn executing_the_plan_reaches_the_target(
        source in model(),
        target in model(),
        platform in platform(),
        case_sensitive in any::<bool>(),
    ) {
        let cs = case_sensitive;
        let target = spelled(&target, cs);
        let plan = plan(&source, &target, &platform, cs).unwrap();

        let mut result = source.clone();
        plan.apply(&mut result, cs).unwrap();
        if platform.name() == "generic" {
            prop_assert!(result.is_equivalent(&target, cs));
        }

        let again = ModelComparator::new(&platform, cs).compare(&result, &target).unwrap();
        prop_assert!(again.is_empty(), "{}: {:#?}", platform.name(), again.changes);
    }
}
