//! DDL builders, column reconciliation, and node execution.

use crate::connection::{ConnectionRegistry, MASTER_CONNECTION};
use crate::error::AdapterResult;
use crate::operation::{split_wrapped_sql, Operation, Segment};
use mason_core::{Column, Node};
use std::collections::{BTreeMap, BTreeSet};

/// Relation kinds the DDL layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    View,
    Table,
}

impl ConnectionRegistry {
    /// `create schema if not exists`.
    pub fn create_schema(&self, name: Option<&str>, schema: &str) -> AdapterResult<String> {
        log::debug!("Creating schema \"{}\"", schema);
        let sql = format!("create schema if not exists \"{}\"", schema);
        let cursor = self.add_query(name, &sql)?;
        Ok(cursor.status())
    }

    /// `create table if not exists` with adapter-supplied dist/sort clauses.
    pub fn create_table(
        &self,
        name: Option<&str>,
        schema: &str,
        table: &str,
        columns: &[Column],
        sort: Option<&str>,
        dist: Option<&str>,
    ) -> AdapterResult<String> {
        log::debug!("Creating table \"{}\".\"{}\"", schema, table);
        let fields: Vec<String> = columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.data_type))
            .collect();
        let dist = self.adapter().dist_qualifier(dist)?;
        let sort = self.adapter().sort_qualifier("compound", sort)?;

        let sql = format!(
            "create table if not exists \"{}\".\"{}\" (\n  {}\n) {} {}",
            schema,
            table,
            fields.join(",\n  "),
            dist,
            sort
        )
        .trim_end()
        .to_string();

        let cursor = self.add_query(name, &sql)?;
        Ok(cursor.status())
    }

    /// Drop a relation of the given kind, cascading.
    pub fn drop(
        &self,
        name: Option<&str>,
        schema: &str,
        relation: &str,
        kind: RelationKind,
    ) -> AdapterResult<String> {
        match kind {
            RelationKind::View => self.drop_view(name, schema, relation),
            RelationKind::Table => self.drop_table(name, schema, relation),
        }
    }

    /// `drop view if exists ... cascade`.
    pub fn drop_view(&self, name: Option<&str>, schema: &str, view: &str) -> AdapterResult<String> {
        let sql = format!("drop view if exists \"{}\".\"{}\" cascade", schema, view);
        let cursor = self.add_query(name, &sql)?;
        Ok(cursor.status())
    }

    /// `drop table if exists ... cascade`.
    pub fn drop_table(
        &self,
        name: Option<&str>,
        schema: &str,
        table: &str,
    ) -> AdapterResult<String> {
        let sql = format!("drop table if exists \"{}\".\"{}\" cascade", schema, table);
        let cursor = self.add_query(name, &sql)?;
        Ok(cursor.status())
    }

    /// `truncate table`.
    pub fn truncate(&self, name: Option<&str>, schema: &str, table: &str) -> AdapterResult<String> {
        let sql = format!("truncate table \"{}\".\"{}\"", schema, table);
        let cursor = self.add_query(name, &sql)?;
        Ok(cursor.status())
    }

    /// `alter table ... rename to` within one schema.
    pub fn rename(
        &self,
        name: Option<&str>,
        schema: &str,
        from_name: &str,
        to_name: &str,
    ) -> AdapterResult<String> {
        let sql = format!(
            "alter table \"{}\".\"{}\" rename to \"{}\"",
            schema, from_name, to_name
        );
        let cursor = self.add_query(name, &sql)?;
        Ok(cursor.status())
    }

    /// Existing relations in a schema, as `relation name -> kind`.
    pub fn query_for_existing(
        &self,
        name: Option<&str>,
        schema: &str,
    ) -> AdapterResult<BTreeMap<String, String>> {
        let sql = self.adapter().query_for_existing_sql(schema);
        let mut cursor = self.add_query(name, &sql)?;

        let mut existing = BTreeMap::new();
        for row in cursor.fetchall()? {
            if let (Some(table), Some(kind)) = (
                row.first().and_then(|v| v.as_str()),
                row.get(1).and_then(|v| v.as_str()),
            ) {
                existing.insert(table.to_string(), kind.to_string());
            }
        }
        Ok(existing)
    }

    /// Whether a relation with this name exists in the schema.
    pub fn table_exists(
        &self,
        name: Option<&str>,
        schema: &str,
        table: &str,
    ) -> AdapterResult<bool> {
        Ok(self.query_for_existing(name, schema)?.contains_key(table))
    }

    /// Columns of one table from `information_schema.columns`, filtered by
    /// table name and, when given, schema name.
    pub fn get_columns_in_table(
        &self,
        name: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> AdapterResult<Vec<Column>> {
        let mut sql = format!(
            "select column_name, data_type, character_maximum_length\nfrom information_schema.columns\nwhere table_name = '{}'",
            table
        );
        if let Some(schema) = schema {
            sql.push_str(&format!(" and table_schema = '{}'", schema));
        }

        let mut cursor = self.add_query(name, &sql)?;
        let mut columns = Vec::new();
        for row in cursor.fetchall()? {
            let column_name = row.first().and_then(|v| v.as_str()).unwrap_or_default();
            let data_type = row.get(1).and_then(|v| v.as_str()).unwrap_or_default();
            let char_size = row.get(2).and_then(|v| v.as_u64());
            columns.push(Column::new(column_name, data_type, char_size));
        }
        Ok(columns)
    }

    /// Columns present in the from-table but absent from the to-table.
    pub fn get_missing_columns(
        &self,
        name: Option<&str>,
        from_schema: Option<&str>,
        from_table: &str,
        to_schema: Option<&str>,
        to_table: &str,
    ) -> AdapterResult<Vec<Column>> {
        let from_columns = self.get_columns_in_table(name, from_schema, from_table)?;
        let to_names: BTreeSet<String> = self
            .get_columns_in_table(name, to_schema, to_table)?
            .into_iter()
            .map(|c| c.name)
            .collect();

        Ok(from_columns
            .into_iter()
            .filter(|c| !to_names.contains(&c.name))
            .collect())
    }

    /// Widen every target column that can expand to its counterpart in the
    /// freshly built temp table. Returns the number of columns altered.
    pub fn expand_target_column_types(
        &self,
        name: Option<&str>,
        temp_table: &str,
        to_schema: &str,
        to_table: &str,
    ) -> AdapterResult<usize> {
        let reference_columns = self.get_columns_in_table(name, None, temp_table)?;
        let target_columns: BTreeMap<String, Column> = self
            .get_columns_in_table(name, Some(to_schema), to_table)?
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        let mut altered = 0;
        for reference in &reference_columns {
            let Some(target) = target_columns.get(&reference.name) else {
                continue;
            };
            if !target.can_expand_to(reference) {
                continue;
            }

            let new_type = Column::string_type(reference.string_size()?);
            log::debug!(
                "Changing col type from {} to {} in table {}.{}",
                target.data_type,
                new_type,
                to_schema,
                to_table
            );
            let sql =
                self.adapter()
                    .alter_column_type_sql(to_schema, to_table, &reference.name, &new_type);
            self.add_query(name, &sql)?;
            altered += 1;
        }
        Ok(altered)
    }

    /// Execute a compiled node: split `wrapped_sql` on operation markers and
    /// process segments in textual order. The reported status is the status
    /// of the last executed segment.
    pub fn execute_node(&self, node: &Node) -> AdapterResult<String> {
        let connection = node
            .config
            .get("connection")
            .and_then(|v| v.as_str())
            .unwrap_or(MASTER_CONNECTION);

        let mut last_status = String::new();
        for segment in split_wrapped_sql(node.compiled_sql())? {
            match segment {
                Segment::Statement(sql) => {
                    let cursor = self.add_query(Some(connection), &sql)?;
                    last_status = cursor.status();
                }
                Segment::Operation(Operation::ExpandColumnTypesIfNeeded {
                    temp_table,
                    to_schema,
                    to_table,
                }) => {
                    let altered = self.expand_target_column_types(
                        Some(connection),
                        &temp_table,
                        &to_schema,
                        &to_table,
                    )?;
                    last_status = format!("ALTER {}", altered);
                }
            }
        }
        Ok(last_status)
    }
}

#[cfg(test)]
#[path = "execute_test.rs"]
mod tests;
