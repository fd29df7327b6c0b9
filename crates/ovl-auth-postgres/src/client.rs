//! Client registry persistence.
//!
//! String-list columns (redirect URIs, scopes, audiences, grant and response
//! types, rotated secret hashes) go through the `ovl_auth::codec` JSON-array
//! codec rather than a delimiter join, so list values survive unchanged.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use ovl_auth::codec;
use ovl_auth::storage::ClientRegistry;
use ovl_auth::{Client, RecordMeta, StoreError, StoreResult};

use crate::{PostgresAuthStore, map_db_err};

type ClientRow = (
    String,                  // id
    bool,                    // active
    String,                  // secret
    String,                  // rotated_secrets
    bool,                    // is_public
    String,                  // redirect_uris
    String,                  // scopes
    String,                  // audience
    String,                  // grant_types
    String,                  // response_types
    String,                  // token_endpoint_auth_method
    OffsetDateTime,          // created_at
    OffsetDateTime,          // updated_at
    Option<OffsetDateTime>,  // deleted_at
);

const CLIENT_COLUMNS: &str = "id, active, secret, rotated_secrets, is_public, redirect_uris, \
                              scopes, audience, grant_types, response_types, \
                              token_endpoint_auth_method, created_at, updated_at, deleted_at";

fn client_from_row(row: ClientRow) -> StoreResult<Client> {
    let (
        id,
        active,
        secret,
        rotated_secrets,
        public,
        redirect_uris,
        scopes,
        audience,
        grant_types,
        response_types,
        token_endpoint_auth_method,
        created_at,
        updated_at,
        deleted_at,
    ) = row;

    Ok(Client {
        id,
        active,
        secret,
        rotated_secrets: codec::from_field(&rotated_secrets)?,
        public,
        redirect_uris: codec::from_field(&redirect_uris)?,
        scopes: codec::from_field(&scopes)?,
        audience: codec::from_field(&audience)?,
        grant_types: codec::from_field(&grant_types)?,
        response_types: codec::from_field(&response_types)?,
        token_endpoint_auth_method,
        meta: RecordMeta {
            created_at,
            updated_at,
            deleted_at,
        },
    })
}

impl PostgresAuthStore {
    pub(crate) async fn find_client(&self, id: &str) -> StoreResult<Option<Client>> {
        let sql =
            format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND deleted_at IS NULL");
        let row: Option<ClientRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;
        row.map(client_from_row).transpose()
    }
}

#[async_trait]
impl ClientRegistry for PostgresAuthStore {
    #[instrument(skip(self))]
    async fn get_client(&self, id: &str) -> StoreResult<Client> {
        self.find_client(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Client '{id}'")))
    }

    #[instrument(skip(self, client), fields(client_id = %client.id))]
    async fn upsert_client(&self, client: &Client) -> StoreResult<()> {
        client.validate()?;

        let rotated_secrets = codec::to_field(&client.rotated_secrets)?;
        let redirect_uris = codec::to_field(&client.redirect_uris)?;
        let scopes = codec::to_field(&client.scopes)?;
        let audience = codec::to_field(&client.audience)?;
        let grant_types = codec::to_field(&client.grant_types)?;
        let response_types = codec::to_field(&client.response_types)?;

        query(
            r#"
            INSERT INTO clients (id, active, secret, rotated_secrets, is_public, redirect_uris,
                                 scopes, audience, grant_types, response_types,
                                 token_endpoint_auth_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET
                active = EXCLUDED.active,
                secret = EXCLUDED.secret,
                rotated_secrets = EXCLUDED.rotated_secrets,
                is_public = EXCLUDED.is_public,
                redirect_uris = EXCLUDED.redirect_uris,
                scopes = EXCLUDED.scopes,
                audience = EXCLUDED.audience,
                grant_types = EXCLUDED.grant_types,
                response_types = EXCLUDED.response_types,
                token_endpoint_auth_method = EXCLUDED.token_endpoint_auth_method,
                updated_at = NOW()
            "#,
        )
        .bind(&client.id)
        .bind(client.active)
        .bind(&client.secret)
        .bind(&rotated_secrets)
        .bind(client.public)
        .bind(&redirect_uris)
        .bind(&scopes)
        .bind(&audience)
        .bind(&grant_types)
        .bind(&response_types)
        .bind(&client.token_endpoint_auth_method)
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;

        debug!(client_id = %client.id, "Client upserted");
        Ok(())
    }
}
