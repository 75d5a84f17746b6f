/// 游标表的一行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CursorRow {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}
