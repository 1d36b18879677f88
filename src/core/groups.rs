//! Локальные назначения групп пользователям по записям

use crate::common::{EntryId, Error, Record, Result, Value, GROUPS_TABLE};
use crate::core::pool::Pool;
use crate::query::{Operator, SelectOptions};
use serde::{Deserialize, Serialize};

/// Строка `pool_groups`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub userid: String,
    pub groupid: String,
    pub id: EntryId,
}

impl GroupAssignment {
    fn from_row(row: Vec<Value>) -> Self {
        let mut row = row.into_iter();
        let userid = row.next().map(|v| v.to_text()).unwrap_or_default();
        let groupid = row.next().map(|v| v.to_text()).unwrap_or_default();
        let id = row.next().and_then(|v| v.as_i64()).unwrap_or(0);
        Self { userid, groupid, id }
    }
}

const GROUP_FIELDS: [&str; 3] = ["userid", "groupid", "id"];

impl Pool {
    /// Назначения групп для одной или нескольких записей
    pub fn get_groups(
        &self,
        ids: &[EntryId],
        userid: Option<&str>,
        group: Option<&str>,
    ) -> Result<Vec<GroupAssignment>> {
        let mut options = SelectOptions::new().single_table();
        let mut parameter = Record::new();
        match ids {
            [] => return Err(Error::validation("Не задан id для выборки групп")),
            [id] => {
                parameter.insert("id".to_string(), Value::Int(*id));
            }
            ids => {
                parameter.insert("id".to_string(), Value::list(ids.iter().copied()));
                options = options.operator("id", Operator::In);
            }
        }
        if let Some(userid) = userid.filter(|u| !u.is_empty()) {
            parameter.insert("userid".to_string(), Value::from(userid));
            options = options.operator("userid", Operator::Eq);
        }
        if let Some(group) = group.filter(|g| !g.is_empty()) {
            parameter.insert("groupid".to_string(), Value::from(group));
            options = options.operator("groupid", Operator::Eq);
        }
        self.query_groups(&parameter, &options)
    }

    /// Добавляет назначение группы
    pub fn add_group(&self, id: EntryId, userid: &str, group: &str) -> Result<()> {
        let mut data = Record::new();
        data.insert("userid".to_string(), Value::from(userid));
        data.insert("groupid".to_string(), Value::from(group));
        data.insert("id".to_string(), Value::Int(id));
        self.insert_fields(GROUPS_TABLE, data, None)?;
        Ok(())
    }

    /// Удаляет назначения записи; без `userid` и `group` удаляются все
    pub fn remove_groups(&self, id: EntryId, userid: Option<&str>, group: Option<&str>) -> Result<bool> {
        let mut parameter = Record::new();
        parameter.insert("id".to_string(), Value::Int(id));
        if let Some(userid) = userid.filter(|u| !u.is_empty()) {
            parameter.insert("userid".to_string(), Value::from(userid));
        }
        if let Some(group) = group.filter(|g| !g.is_empty()) {
            parameter.insert("groupid".to_string(), Value::from(group));
        }
        self.delete_records(GROUPS_TABLE, &parameter)
    }

    /// Все назначения пользователя во всех записях
    pub fn get_all_user_groups(&self, userid: &str) -> Result<Vec<GroupAssignment>> {
        let parameter = Record::from([("userid".to_string(), Value::from(userid))]);
        let options = SelectOptions::new()
            .single_table()
            .operator("userid", Operator::Eq);
        self.query_groups(&parameter, &options)
    }

    fn query_groups(&self, parameter: &Record, options: &SelectOptions) -> Result<Vec<GroupAssignment>> {
        let (sql, values) = self.fmt_sql_select(&GROUP_FIELDS, parameter, GROUPS_TABLE, options)?;
        Ok(self
            .query(&sql, &values)?
            .into_iter()
            .map(GroupAssignment::from_row)
            .collect())
    }
}
