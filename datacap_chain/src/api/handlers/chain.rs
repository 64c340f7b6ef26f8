use axum::{
    extract::{rejection::QueryRejection, FromRequest, Multipart, Query, Request, State},
    http::header,
    Form, Json,
};
use log::{debug, warn};

use crate::api::errors::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::common::Result;
use crate::node::ConnectionProvider;
use crate::types::{CidEncoder, DealResult, Multibase, StartDealParams, TipSetKey};

pub const CLIENT_STATELESS_DEAL: &str = "ClientStatelessDeal";

/// Fields of `POST /chain/api`, from the form body or the query string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChainApiForm {
    pub method: Option<String>,
    pub params: Option<String>,
}

impl ChainApiForm {
    /// Keep the first value of each field; later repeats are ignored.
    pub fn from_pairs<I>(pairs: I) -> ChainApiForm
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = ChainApiForm::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "method" => &mut form.method,
                "params" => &mut form.params,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        form
    }

    /// Fill empty fields from `fallback`; body values win over query values.
    pub fn or(self, fallback: ChainApiForm) -> ChainApiForm {
        ChainApiForm {
            method: non_empty(self.method).or_else(|| non_empty(fallback.method)),
            params: non_empty(self.params).or_else(|| non_empty(fallback.params)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Text fields of a urlencoded or multipart body. File parts are skipped and
/// an unreadable body yields no fields.
async fn body_fields(request: Request, state: &AppState) -> Vec<(String, String)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        return match Form::<Vec<(String, String)>>::from_request(request, state).await {
            Ok(Form(fields)) => fields,
            Err(e) => {
                debug!("Ignoring unreadable form body: {}", e);
                Vec::new()
            }
        };
    }

    let mut multipart = match Multipart::from_request(request, state).await {
        Ok(multipart) => multipart,
        Err(e) => {
            debug!("Ignoring unreadable multipart body: {}", e);
            return Vec::new();
        }
    };
    let mut fields = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                if field.file_name().is_some() {
                    continue;
                }
                match field.text().await {
                    Ok(text) => fields.push((name, text)),
                    Err(e) => {
                        debug!("Stopping at unreadable multipart field {}: {}", name, e);
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopping at malformed multipart body: {}", e);
                break;
            }
        }
    }
    fields
}

/// `POST /chain/api`
///
/// An unparsable body or query is treated as one without fields, so the
/// caller gets the usual "not found" answers instead of an extractor error.
pub async fn handle_chain_api(
    State(state): State<AppState>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
    request: Request,
) -> ApiResult<Json<DealResult>> {
    let query = query.map(|Query(pairs)| pairs).unwrap_or_default();
    let body = body_fields(request, &state).await;
    let form = ChainApiForm::from_pairs(body).or(ChainApiForm::from_pairs(query));

    let method = form.method.ok_or_else(ApiError::method_not_found)?;
    let params = form.params.ok_or_else(ApiError::params_not_found)?;

    match method.as_str() {
        CLIENT_STATELESS_DEAL => {
            let deal = StartDealParams::from_json(&params).map_err(|e| {
                warn!("Failed to decode {} params: {}", CLIENT_STATELESS_DEAL, e);
                ApiError::decode_params_failed()
            })?;
            let result = make_stateless_deal(state.nodes.as_ref(), deal).await?;
            Ok(Json(result))
        }
        _ => Err(ApiError::unsupported_method()),
    }
}

/// Submit a stateless deal, marking it verified iff the wallet holds datacap.
///
/// The caller's `VerifiedDeal` is discarded. Any failure invalidates the
/// cached node connection before it is returned.
pub async fn make_stateless_deal(
    nodes: &dyn ConnectionProvider,
    mut params: StartDealParams,
) -> Result<DealResult> {
    let api = match nodes.acquire().await {
        Ok(api) => api,
        Err(e) => {
            warn!("Failed to get full node API: {}", e);
            nodes.invalidate().await;
            return Err(e);
        }
    };

    let datacap = match api
        .state_verified_client_status(&params.wallet, &TipSetKey::empty())
        .await
    {
        Ok(datacap) => datacap,
        Err(e) => {
            warn!("{}, request: {:?}", e, params);
            nodes.invalidate().await;
            return Err(e);
        }
    };

    let verified = datacap.is_some();
    if params.verified_deal != verified {
        debug!(
            "Overriding caller VerifiedDeal={} with {} for wallet {}",
            params.verified_deal, verified, params.wallet
        );
    }
    params.verified_deal = verified;

    let prop_cid = match api.client_stateless_deal(&params).await {
        Ok(cid) => cid,
        Err(e) => {
            warn!("{}, request: {:?}", e, params);
            nodes.invalidate().await;
            return Err(e);
        }
    };

    Ok(DealResult {
        prop_cid: CidEncoder::new(Multibase::Base32).encode(&prop_cid),
        verified,
    })
}
