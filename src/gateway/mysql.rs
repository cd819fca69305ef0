use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;

use super::row::row_to_record;
use super::{GatewayError, PolicyDates, PolicyRecord, PolicySession, SshTunnel};
use crate::config::MySqlConfig;

const RECENT_POLICIES_SQL: &str = "SELECT * FROM products_policies ORDER BY id DESC LIMIT ?";

const FIND_POLICY_SQL: &str = "SELECT * FROM products_policies WHERE policy_id = ? LIMIT 1";

// Counted inside the update transaction so a repeated update (zero changed
// rows) still reports the rows it matched.
const COUNT_POLICY_SQL: &str =
    "SELECT COUNT(*) FROM products_policies WHERE policy_id = ? FOR UPDATE";

const UPDATE_POLICY_DATES_SQL: &str =
    "UPDATE products_policies SET policy_start = ?, policy_end = ? WHERE policy_id = ?";

/// A MySQL connection running through its own SSH tunnel.
pub struct MySqlSession {
    conn: MySqlConnection,
    tunnel: SshTunnel,
}

impl MySqlSession {
    /// Connect to the database through `tunnel`. The tunnel is shut down if
    /// the connection cannot be made.
    pub async fn connect(tunnel: SshTunnel, mysql: &MySqlConfig) -> Result<Self, GatewayError> {
        let options = MySqlConnectOptions::new()
            .host("127.0.0.1")
            .port(tunnel.local_port())
            .username(&mysql.user)
            .password(&mysql.password)
            .database(&mysql.database);

        match MySqlConnection::connect_with(&options).await {
            Ok(conn) => {
                tracing::debug!(
                    local = %tunnel.local_addr(),
                    database = %mysql.database,
                    "database connection opened"
                );
                Ok(Self { conn, tunnel })
            }
            Err(e) => {
                tunnel.shutdown().await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl PolicySession for MySqlSession {
    async fn recent_policies(&mut self, limit: u32) -> Result<Vec<PolicyRecord>, GatewayError> {
        let rows = sqlx::query(RECENT_POLICIES_SQL)
            .bind(limit)
            .fetch_all(&mut self.conn)
            .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn find_policy(&mut self, policy_id: &str) -> Result<Option<PolicyRecord>, GatewayError> {
        let row = sqlx::query(FIND_POLICY_SQL)
            .bind(policy_id)
            .fetch_optional(&mut self.conn)
            .await?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn update_policy_dates(
        &mut self,
        policy_id: &str,
        dates: &PolicyDates,
    ) -> Result<u64, GatewayError> {
        let mut tx = self.conn.begin().await?;

        let matched: i64 = sqlx::query_scalar(COUNT_POLICY_SQL)
            .bind(policy_id)
            .fetch_one(&mut *tx)
            .await?;

        let result = sqlx::query(UPDATE_POLICY_DATES_SQL)
            .bind(&dates.policy_start)
            .bind(&dates.policy_end)
            .bind(policy_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            policy_id,
            matched,
            changed = result.rows_affected(),
            "policy dates updated"
        );
        Ok(u64::try_from(matched).unwrap_or(0))
    }

    async fn close(self: Box<Self>) {
        let MySqlSession { conn, tunnel } = *self;

        if let Err(e) = conn.close().await {
            tracing::warn!("failed to close database connection cleanly: {}", e);
        }
        tunnel.shutdown().await;
    }
}
