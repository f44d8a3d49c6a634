use crate::{
    api::{records, runs},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let run_ops_limiter = Arc::new(build_limiter(config.rate_run_ops_per_min));
    let read_limiter = Arc::new(build_limiter(config.rate_read_per_min));

    cfg.service(
        web::scope(&format!("{}/v1", config.api_prefix)).service(
            web::scope("/payroll-runs")
                // /payroll-runs
                .service(
                    web::resource("")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::create_run))
                        .route(web::get().to(runs::list_runs)),
                )
                // /payroll-runs/{run_id}
                .service(
                    web::resource("/{run_id}")
                        .wrap(read_limiter.clone())
                        .route(web::get().to(runs::get_run))
                        .route(web::delete().to(runs::delete_run)),
                )
                // /payroll-runs/{run_id}/recalculate
                .service(
                    web::resource("/{run_id}/recalculate")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::recalculate_run)),
                )
                // /payroll-runs/{run_id}/sync-membership
                .service(
                    web::resource("/{run_id}/sync-membership")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::sync_membership)),
                )
                // /payroll-runs/{run_id}/submit
                .service(
                    web::resource("/{run_id}/submit")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::submit_run)),
                )
                // /payroll-runs/{run_id}/approve
                .service(
                    web::resource("/{run_id}/approve")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::approve_run)),
                )
                // /payroll-runs/{run_id}/cancel
                .service(
                    web::resource("/{run_id}/cancel")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::cancel_run)),
                )
                // /payroll-runs/{run_id}/revert
                .service(
                    web::resource("/{run_id}/revert")
                        .wrap(run_ops_limiter.clone())
                        .route(web::post().to(runs::revert_run)),
                )
                // /payroll-runs/{run_id}/records/{record_id}
                .service(
                    web::resource("/{run_id}/records/{record_id}")
                        .wrap(run_ops_limiter)
                        .route(web::patch().to(records::patch_record)),
                ),
        ),
    );
}
