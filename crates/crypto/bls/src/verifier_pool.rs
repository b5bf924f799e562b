use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{sync::Semaphore, task};
use tracing::{debug, warn};

use crate::{
    batch::{VerifyOptions, verify_signature_sets},
    errors::BLSError,
    signature_set::SignatureSet,
};

/// One caller's verification request.
#[derive(Debug, Clone)]
pub struct VerificationJob {
    pub sets: Vec<SignatureSet>,
    pub options: VerifyOptions,
}

impl VerificationJob {
    pub fn new(sets: Vec<SignatureSet>, options: VerifyOptions) -> Self {
        Self { sets, options }
    }
}

/// Runs signature verification on tokio's blocking threads.
///
/// A timeout only discards the result. The blocking task keeps running to completion and
/// nothing it touches is shared with the caller.
#[derive(Debug, Clone)]
pub struct VerifierPool {
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl VerifierPool {
    pub fn new(max_concurrent_jobs: usize, timeout: Option<Duration>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            timeout,
        }
    }

    pub async fn verify(
        &self,
        sets: Vec<SignatureSet>,
        options: VerifyOptions,
    ) -> Result<bool, BLSError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BLSError::PoolClosed)?;
        let handle = task::spawn_blocking(move || {
            let _permit = permit;
            verify_signature_sets(&sets, options)
        });

        let joined = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, handle)
                .await
                .map_err(|_| BLSError::VerificationTimedOut)?,
            None => handle.await,
        };
        joined.map_err(|err| BLSError::WorkerFailed(err.to_string()))?
    }

    /// Verifies several independent jobs, returning one result per job in order.
    ///
    /// Distinct-message jobs are coalesced into a single batch; same-message jobs keep their
    /// own aggregate check. When the coalesced batch fails, every job in it is re-verified
    /// alone so a bad job never rejects its neighbours.
    pub async fn verify_jobs(&self, jobs: Vec<VerificationJob>) -> Vec<Result<bool, BLSError>> {
        let mut results = vec![Ok(false); jobs.len()];
        let mut coalesced = vec![];
        let mut separate = vec![];

        for (index, job) in jobs.into_iter().enumerate() {
            if job.sets.is_empty() {
                results[index] = Err(BLSError::EmptySignatureSet);
            } else if job.options.is_same_message {
                separate.push((index, job));
            } else {
                coalesced.push((index, job));
            }
        }

        if coalesced.len() > 1 {
            let sets = coalesced
                .iter()
                .flat_map(|(_, job)| job.sets.iter().cloned())
                .collect();
            match self.verify(sets, VerifyOptions::default()).await {
                Ok(true) => {
                    debug!(jobs = coalesced.len(), "Coalesced signature batch verified");
                    for (index, _) in coalesced.drain(..) {
                        results[index] = Ok(true);
                    }
                }
                Ok(false) => {
                    warn!(
                        jobs = coalesced.len(),
                        "Coalesced signature batch failed, verifying jobs individually"
                    );
                }
                Err(err) => {
                    warn!(?err, "Coalesced signature batch errored, verifying jobs individually");
                }
            }
        }
        separate.append(&mut coalesced);

        let outcomes = join_all(
            separate
                .into_iter()
                .map(|(index, job)| async move { (index, self.verify(job.sets, job.options).await) }),
        )
        .await;
        for (index, outcome) in outcomes {
            results[index] = outcome;
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use tracing_test::traced_test;

    use super::*;
    use crate::{PrivateKey, traits::Signable};

    fn signed_set(seed: u8, root: B256) -> SignatureSet {
        let private_key = PrivateKey::key_gen(&[seed; 32]).expect("valid ikm");
        let signature = private_key.sign(root.as_slice()).expect("signs");
        SignatureSet::single(private_key.public_key().expect("valid key"), root, signature)
    }

    fn distinct_job(seed: u8) -> VerificationJob {
        VerificationJob::new(
            vec![
                signed_set(seed, B256::repeat_byte(seed)),
                signed_set(seed + 100, B256::repeat_byte(seed + 100)),
            ],
            VerifyOptions::default(),
        )
    }

    #[tokio::test]
    async fn pool_matches_inline_verification() {
        let pool = VerifierPool::new(2, None);
        let job = distinct_job(1);
        let inline = verify_signature_sets(&job.sets, job.options);
        assert_eq!(pool.verify(job.sets, job.options).await, inline);
    }

    #[tokio::test]
    async fn empty_job_is_rejected() {
        let pool = VerifierPool::new(1, None);
        assert_eq!(
            pool.verify(vec![], VerifyOptions::default()).await,
            Err(BLSError::EmptySignatureSet)
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn coalesced_failure_is_isolated_to_the_bad_job() {
        let pool = VerifierPool::new(4, None);
        let mut bad = distinct_job(3);
        bad.sets[0].signature = bad.sets[1].signature.clone();
        let same_message = VerificationJob::new(
            vec![
                signed_set(10, B256::repeat_byte(0x55)),
                signed_set(11, B256::repeat_byte(0x55)),
            ],
            VerifyOptions::same_message(),
        );
        let jobs = vec![
            distinct_job(1),
            bad,
            VerificationJob::new(vec![], VerifyOptions::default()),
            distinct_job(2),
            same_message,
        ];

        let results = pool.verify_jobs(jobs).await;

        assert_eq!(
            results,
            vec![
                Ok(true),
                Ok(false),
                Err(BLSError::EmptySignatureSet),
                Ok(true),
                Ok(true)
            ]
        );
        assert!(logs_contain("verifying jobs individually"));
    }

    #[tokio::test]
    async fn coalesced_success_accepts_every_job() {
        let pool = VerifierPool::new(4, Some(Duration::from_secs(30)));
        let results = pool
            .verify_jobs(vec![distinct_job(1), distinct_job(2), distinct_job(3)])
            .await;
        assert_eq!(results, vec![Ok(true), Ok(true), Ok(true)]);
    }
}
