//! Reconciliation run for IAM Access Probe service

use log::{debug, info, warn};
use std::borrow::Cow;

use crate::catalog::expand;
use crate::matrix::ExpectationMatrix;
use crate::probe::{ProbePayload, Prober};
use crate::report::{Report, SkippedEntry};
use crate::resolve::resolve;
use crate::storage::StoreFactory;
use crate::types::{IamProfile, ResourceCatalog};

impl<F: StoreFactory> super::service::AccessProbeService<F> {
    /// Probe every (iam, bucket, resource, action) tuple of `matrix` and report
    /// the tuples whose outcome differs from the effective expectation.
    ///
    /// Iteration follows declared order: IAMs, then buckets, then the IAM's
    /// resources, then the resolved actions. Probes run one at a time. Malformed
    /// entries and failing probes never stop the walk; only the abort flag or
    /// repeated client construction failures do, and only between IAMs.
    pub async fn run(&self, matrix: &ExpectationMatrix, payload: &ProbePayload) -> Report {
        let mut report = Report::new();
        for skipped in &matrix.skipped {
            report.skip(skipped.clone());
        }

        let mut consecutive_client_failures = 0;

        for profile in &matrix.iams {
            if self.abort_requested() {
                warn!("Abort requested, stopping before IAM '{}'", profile.name);
                report.aborted = Some(format!("interrupted before IAM '{}'", profile.name));
                break;
            }

            info!("### Testing IAM {} ###", profile.name);

            if let ResourceCatalog::Invalid(reason) = &profile.resources {
                warn!("Skipping IAM '{}': {}", profile.name, reason);
                report.skip(SkippedEntry::iam(profile.name.as_str(), reason.as_str()));
                continue;
            }

            debug!("Setting up storage client for IAM '{}'", profile.name);
            let store = match self.factory.connect(profile).await {
                Ok(store) => {
                    consecutive_client_failures = 0;
                    store
                }
                Err(e) => {
                    consecutive_client_failures += 1;
                    warn!(
                        "Could not create storage client for IAM '{}': {}",
                        profile.name, e
                    );
                    report.skip(SkippedEntry::iam(
                        profile.name.as_str(),
                        format!("could not create storage client: {e}"),
                    ));
                    if consecutive_client_failures >= self.options.max_consecutive_client_failures
                    {
                        report.aborted = Some(format!(
                            "{consecutive_client_failures} consecutive storage client failures, last: {e}"
                        ));
                        break;
                    }
                    continue;
                }
            };

            let profile: Cow<'_, IamProfile> = if self.options.expand_catalog {
                Cow::Owned(expand(
                    profile,
                    &matrix.resources,
                    &matrix.default_expected_permissions,
                ))
            } else {
                Cow::Borrowed(profile)
            };
            let ResourceCatalog::Declared(resources) = &profile.resources else {
                continue;
            };

            let prober = Prober::new(
                store.as_ref(),
                payload.body(),
                &self.options.probe_file_name,
            );

            for bucket in &matrix.buckets {
                info!("Testing against bucket '{}'", bucket);
                let bucket_is_allowed = profile.is_bucket_allowed(bucket);

                for resource in resources {
                    info!(
                        "  - Testing resource '{}' of type {}",
                        resource.path, resource.kind
                    );
                    if bucket_is_allowed {
                        debug!("  - Using custom expected permissions");
                    } else {
                        debug!("  - Using default expected permissions");
                    }

                    let effective = match resolve(
                        &matrix.default_expected_permissions,
                        &resource.actions,
                        bucket_is_allowed,
                    ) {
                        Ok(effective) => effective,
                        Err(e) => {
                            warn!(
                                "Skipping resource '{}' of IAM '{}' on bucket '{}': {}",
                                resource.path, profile.name, bucket, e
                            );
                            report.skip(SkippedEntry::resource(
                                profile.name.as_str(),
                                Some(bucket.as_str()),
                                resource.path.as_str(),
                                e.to_string(),
                            ));
                            continue;
                        }
                    };

                    for (action, expected) in effective.iter() {
                        let outcome = prober
                            .probe(bucket, &resource.path, resource.kind, action)
                            .await;
                        if outcome.succeeded == expected {
                            debug!("    {} OK", action);
                        } else {
                            info!(
                                "    {} KO, {} expected",
                                action,
                                if expected { "ALLOWED" } else { "NOT ALLOWED" }
                            );
                        }
                        report.record(
                            &profile.name,
                            bucket,
                            &resource.path,
                            action,
                            expected,
                            outcome,
                        );
                    }
                }
            }
        }

        info!(
            "Run finished: {} probes, {} mismatches, {} skipped entries",
            report.probes_executed,
            report.mismatches.len(),
            report.skipped.len()
        );
        report
    }
}
