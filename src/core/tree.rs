//! Обход дерева записей по `pool_unitref`
//!
//! SQLite и PostgreSQL обходят дерево последовательными запросами по
//! уровням. Для MySQL используется один запрос, в котором до 10 предков
//! каждой строки выбираются вложенными подзапросами.

use crate::common::{EntryId, Record, Result, Value, MAX_PARENT_DEPTH, META_TABLE};
use crate::connection::TreeStrategy;
use crate::core::pool::Pool;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Узел дерева записей
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: EntryId,
    /// Запрошенные поля узла
    #[serde(flatten)]
    pub values: Record,
    pub items: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            values: Record::new(),
            items: Vec::new(),
        }
    }

    /// Ищет узел в поддереве
    pub fn find(&self, id: EntryId) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.items.iter().find_map(|item| item.find(id))
    }

    /// Id всех потомков в порядке обхода в глубину
    pub fn descendant_ids(&self) -> Vec<EntryId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut Vec<EntryId>) {
        for item in &self.items {
            ids.push(item.id);
            item.collect_ids(ids);
        }
    }
}

impl Pool {
    /// Id всех потомков `base` без самого `base`
    ///
    /// `parameter` - дополнительное SQL условие на строки метаданных.
    pub fn get_contained_ids(&self, base: EntryId, sort: &str, parameter: &str) -> Result<Vec<EntryId>> {
        Ok(self.get_tree(&["id"], sort, base, parameter)?.descendant_ids())
    }

    /// Поддерево `base` с полями метаданных в узлах
    ///
    /// Корень результата - сам `base` без значений полей.
    pub fn get_tree(&self, fields: &[&str], sort: &str, base: EntryId, parameter: &str) -> Result<TreeNode> {
        let fields: Vec<&str> = fields.iter().copied().filter(|f| *f != "id").collect();
        let sort = if sort.trim().is_empty() { "id" } else { sort };
        match self.dialect().tree_strategy() {
            TreeStrategy::Recursive => self.tree_recursive(&fields, sort, base, parameter),
            TreeStrategy::Unrolled => self.tree_unrolled(&fields, sort, base, parameter),
        }
    }

    fn tree_recursive(&self, fields: &[&str], sort: &str, base: EntryId, parameter: &str) -> Result<TreeNode> {
        let ph = self.placeholder();
        let parent_condition = if base == 0 {
            format!("(pool_unitref = {} OR pool_unitref IS NULL)", ph)
        } else {
            format!("pool_unitref = {}", ph)
        };
        let condition = if parameter.trim().is_empty() {
            parent_condition
        } else {
            format!("{} AND ({})", parent_condition, parameter)
        };
        let columns: Vec<&str> = std::iter::once("id").chain(fields.iter().copied()).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            columns.join(","),
            META_TABLE,
            condition,
            sort
        );

        let mut visited = HashSet::from([base]);
        let mut root = TreeNode::new(base);
        self.select_children(&sql, &columns, &mut root, &mut visited)?;
        Ok(root)
    }

    fn select_children(
        &self,
        sql: &str,
        columns: &[&str],
        node: &mut TreeNode,
        visited: &mut HashSet<EntryId>,
    ) -> Result<()> {
        for row in self.query(sql, &[Value::Int(node.id)])? {
            let mut values = self
                .structure()
                .deserialize_record(META_TABLE, Pool::convert_rec_to_dict(row, columns))?;
            let Some(id) = values.shift_remove("id").and_then(|v| v.as_i64()) else {
                continue;
            };
            if !visited.insert(id) {
                log::warn!("Entry {} appears twice in tree below {}", id, node.id);
                continue;
            }
            let mut child = TreeNode { id, values, items: Vec::new() };
            self.select_children(sql, columns, &mut child, visited)?;
            node.items.push(child);
        }
        Ok(())
    }

    fn tree_unrolled(&self, fields: &[&str], sort: &str, base: EntryId, parameter: &str) -> Result<TreeNode> {
        let mut refs = vec!["pool_unitref AS ref1".to_string()];
        for level in 2..=MAX_PARENT_DEPTH {
            refs.push(format!(
                "(SELECT pool_unitref FROM {} WHERE id = ref{}) AS ref{}",
                META_TABLE,
                level - 1,
                level
            ));
        }
        let where_clause = if parameter.trim().is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parameter)
        };
        let columns: Vec<&str> = std::iter::once("id").chain(fields.iter().copied()).collect();
        let sql = format!(
            "SELECT {}, {} FROM {}{} ORDER BY pool_unitref, {}",
            refs.join(", "),
            columns.join(","),
            META_TABLE,
            where_clause,
            sort
        );

        let mut children: HashMap<EntryId, Vec<TreeNode>> = HashMap::new();
        for mut row in self.query(&sql, &[])? {
            let data = row.split_off(MAX_PARENT_DEPTH.min(row.len()));
            let ancestors: Vec<EntryId> = row.iter().map(|v| v.as_i64().unwrap_or(0)).collect();
            if !ancestors.contains(&base) {
                continue;
            }
            let mut values = self
                .structure()
                .deserialize_record(META_TABLE, Pool::convert_rec_to_dict(data, &columns))?;
            let Some(id) = values.shift_remove("id").and_then(|v| v.as_i64()) else {
                continue;
            };
            if id == base {
                continue;
            }
            let parent = ancestors.first().copied().unwrap_or(0);
            children
                .entry(parent)
                .or_default()
                .push(TreeNode { id, values, items: Vec::new() });
        }

        let mut root = TreeNode::new(base);
        let mut visited = HashSet::from([base]);
        attach_children(&mut root, &mut children, &mut visited);
        Ok(root)
    }

    /// Id предков записи от корня к родителю, не больше 10 уровней
    pub fn get_parent_path(&self, id: EntryId) -> Result<Vec<EntryId>> {
        if id <= 0 {
            return Ok(Vec::new());
        }
        let columns: Vec<String> = (1..=MAX_PARENT_DEPTH)
            .map(|level| format!("t{}.pool_unitref AS ref{}", level, level))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} AS t1 {} WHERE t1.id = {}",
            columns.join(", "),
            META_TABLE,
            parent_joins(MAX_PARENT_DEPTH),
            self.placeholder()
        );
        let Some(row) = self.query(&sql, &[Value::Int(id)])?.into_iter().next() else {
            return Ok(Vec::new());
        };
        let mut parents = Vec::new();
        for value in row {
            match value.as_i64() {
                None => continue,
                Some(parent) if parent <= 0 => break,
                Some(parent) => parents.insert(0, parent),
            }
        }
        Ok(parents)
    }

    /// Заголовки предков записи от корня к родителю
    pub fn get_parent_titles(&self, id: EntryId) -> Result<Vec<String>> {
        if id <= 0 {
            return Ok(Vec::new());
        }
        let columns: Vec<String> = (1..=MAX_PARENT_DEPTH)
            .map(|level| format!("t{}.pool_unitref AS ref{}, t{}.title AS title{}", level, level, level + 1, level))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} AS t1 {} WHERE t1.id = {}",
            columns.join(", "),
            META_TABLE,
            parent_joins(MAX_PARENT_DEPTH + 1),
            self.placeholder()
        );
        let Some(row) = self.query(&sql, &[Value::Int(id)])?.into_iter().next() else {
            return Ok(Vec::new());
        };
        let mut titles = Vec::new();
        for pair in row.chunks(2) {
            let parent = pair.first().and_then(Value::as_i64).unwrap_or(0);
            if parent <= 0 {
                break;
            }
            match pair.get(1) {
                None | Some(Value::Null) => break,
                Some(Value::Bytes(bytes)) => titles.insert(0, self.encode_text(bytes)),
                Some(title) => titles.insert(0, title.to_text()),
            }
        }
        Ok(titles)
    }
}

/// `LEFT JOIN` цепочка `t2..t<count>` по `pool_unitref`
fn parent_joins(count: usize) -> String {
    (2..=count)
        .map(|level| {
            format!(
                "LEFT JOIN {} AS t{} ON t{}.id = t{}.pool_unitref",
                META_TABLE,
                level,
                level,
                level - 1
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn attach_children(
    node: &mut TreeNode,
    children: &mut HashMap<EntryId, Vec<TreeNode>>,
    visited: &mut HashSet<EntryId>,
) {
    let Some(items) = children.remove(&node.id) else {
        return;
    };
    for mut child in items {
        if !visited.insert(child.id) {
            continue;
        }
        attach_children(&mut child, children, visited);
        node.items.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_joins() {
        let joins = parent_joins(3);
        assert_eq!(
            joins,
            "LEFT JOIN pool_meta AS t2 ON t2.id = t1.pool_unitref \
             LEFT JOIN pool_meta AS t3 ON t3.id = t2.pool_unitref"
        );
    }

    #[test]
    fn test_attach_children_builds_nested_tree() {
        let mut children: HashMap<EntryId, Vec<TreeNode>> = HashMap::new();
        children.insert(1, vec![TreeNode::new(2), TreeNode::new(3)]);
        children.insert(2, vec![TreeNode::new(4)]);
        children.insert(9, vec![TreeNode::new(10)]);

        let mut root = TreeNode::new(1);
        attach_children(&mut root, &mut children, &mut HashSet::from([1]));
        assert_eq!(root.descendant_ids(), vec![2, 4, 3]);
        assert!(root.find(4).is_some());
        assert!(root.find(10).is_none());
    }

    #[test]
    fn test_tree_node_serializes_flat() {
        let mut node = TreeNode::new(5);
        node.values.insert("title".to_string(), Value::from("a"));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["id"], 5);
        assert_eq!(json["title"], "a");
        assert!(json["items"].as_array().unwrap().is_empty());
    }
}
