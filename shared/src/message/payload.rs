use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::models::{Reference, either, either_ref};
use crate::resource::ResourceType;

// ==================== Payloads ====================

/// 删除载荷 (服务端 -> 客户端)
///
/// `*_DELETED` 事件只携带定位实体所需的字段；即使服务端附带完整实体，
/// 其余字段也会被忽略。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TombstoneRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "_id")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub outlet_id: Option<Reference>,
    #[serde(default)]
    pub outlet: Option<Reference>,
    #[serde(default)]
    pub sequence_id: Option<u64>,
}

impl TombstoneRecord {
    pub fn normalize(self) -> ModelResult<Tombstone> {
        Ok(Tombstone {
            id: either("id", self.id, self.object_id)?,
            outlet_id: either_ref("outletId", self.outlet_id, self.outlet)?,
            sequence_id: self.sequence_id,
        })
    }
}

/// 删除标记 (已规范化)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub id: String,
    pub outlet_id: String,
    pub sequence_id: Option<u64>,
}

/// 全量同步请求载荷 (`SNAPSHOT_REQUIRED`)
///
/// 服务端无法再提供增量时发出此信号。
///
/// # 示例
/// - `{}`: 所有资源类型
/// - `{ "resource": "order", "outletId": "o-1" }`: 仅订单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    /// 资源类型 (为空表示全部)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceType>,
    /// 门店范围
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<String>,
}

impl SnapshotRequest {
    /// Resource types that need a full reconciliation
    pub fn resources(&self) -> Vec<ResourceType> {
        match self.resource {
            Some(resource) => vec![resource],
            None => ResourceType::ALL.to_vec(),
        }
    }
}
