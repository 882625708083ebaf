// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Adaptive Regularized Inversion
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Iterative linearized inversion with damping, smoothing and residual-driven
//! prism splitting.
//!
//! Each iteration solves
//! `(GᵗWG + lam·diag(sigma_param) + gam·S)·Δ = GᵗW·r`
//! for the update `Δ` of the parameters (constant term last), recomputes the
//! median-centred residual `r`, and splits the prisms that dominate the
//! largest residuals before the next pass.

use crate::mesh::PrismMesh;
use crate::refinement::RefinementSelector;
use crate::regularization::{conditioning_diagnostic, is_ill_conditioned, RegularizationModel};
use crate::window::WindowedData;
use ndarray::{s, Array1, Array2};
use potfield_math::linalg::{invert, weighted_transpose};
use potfield_math::stats::{median, std_population};
use potfield_types::config::{DampingConfig, InversionConfig, PropertySet};
use potfield_types::error::{PotfieldError, PotfieldResult};
use potfield_types::state::{
    ConditioningDecision, ConditioningDiagnostic, HaltReason, InversionHistory, InversionReport,
    SplitRecord,
};
use tracing::{debug, info, warn};

/// Consecutive stagnant iterations that end the run.
const STAGNATION_LIMIT: usize = 2;

/// Caller decision on the first-iteration conditioning diagnostic.
pub trait ConditioningPolicy {
    fn decide(&mut self, diagnostic: &ConditioningDiagnostic) -> ConditioningDecision;
}

impl<F> ConditioningPolicy for F
where
    F: FnMut(&ConditioningDiagnostic) -> ConditioningDecision,
{
    fn decide(&mut self, diagnostic: &ConditioningDiagnostic) -> ConditioningDecision {
        self(diagnostic)
    }
}

/// Accept any conditioning and go on.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptConditioning;

impl ConditioningPolicy for AcceptConditioning {
    fn decide(&mut self, _diagnostic: &ConditioningDiagnostic) -> ConditioningDecision {
        ConditioningDecision::Continue
    }
}

/// Mutable bookkeeping carried from one iteration to the next.
#[derive(Debug, Clone)]
pub struct IterationState {
    /// Solves performed so far
    pub iteration: usize,
    pub lambda: f64,
    pub gamma: f64,
    /// Current parameters, constant term last
    pub params: Array1<f64>,
    /// Median-centred residual driving the next solve
    pub residual: Option<Array1<f64>>,
    pub data_mod: Array1<f64>,
    /// std of the current residual
    pub std_misfit: f64,
    pub stagnant_iterations: usize,
    pub conditioning_checked: bool,
    pub conditioning: Option<ConditioningDiagnostic>,
    pub history: InversionHistory,
}

/// Owner of one inversion: read-only configuration and data, the prism
/// model and the iteration state.
pub struct InversionEngine<M: PrismMesh> {
    config: InversionConfig,
    properties: PropertySet,
    damping: DampingConfig,
    regularization: RegularizationModel,
    selector: RefinementSelector,
    data: WindowedData,
    mesh: M,
    state: IterationState,
}

/// Outcome of one linearized solve.
enum SolveOutcome {
    Solved,
    Halted(HaltReason),
}

impl<M: PrismMesh> InversionEngine<M> {
    /// Validate the configuration and set up the initial state from the
    /// current prism properties.
    pub fn new(config: InversionConfig, mesh: M, data: WindowedData) -> PotfieldResult<Self> {
        config.validate()?;
        if data.n_data() == 0 || data.points.len() != data.n_data() {
            return Err(PotfieldError::DimensionMismatch {
                context: "inversion: observation points".to_string(),
                expected: data.n_data(),
                got: data.points.len(),
            });
        }
        if mesh.n_prisms() == 0 {
            return Err(PotfieldError::ConfigError(
                "prism model contains no prism".to_string(),
            ));
        }
        let properties = config.property_set();
        let damping = config.damping();
        let regularization =
            RegularizationModel::new(config.data_type, properties, config.uncertainty);
        let selector = RefinementSelector::from(&config.refinement);

        let mut params = mesh.parameters(properties).to_vec();
        params.push(0.0);
        let state = IterationState {
            iteration: 0,
            lambda: damping.lambda.initial,
            gamma: damping.gamma.initial,
            params: Array1::from_vec(params),
            residual: None,
            data_mod: Array1::zeros(data.n_data()),
            std_misfit: data.std_data_ori,
            stagnant_iterations: 0,
            conditioning_checked: false,
            conditioning: None,
            history: InversionHistory::default(),
        };

        Ok(InversionEngine {
            config,
            properties,
            damping,
            regularization,
            selector,
            data,
            mesh,
            state,
        })
    }

    pub fn config(&self) -> &InversionConfig {
        &self.config
    }

    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    pub fn data(&self) -> &WindowedData {
        &self.data
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// Run up to `stopping.max_iterations` further solves.
    ///
    /// With `max_iterations == 0` only the forward response of the current
    /// model is evaluated. Every halt returns a usable report; errors are
    /// reserved for inconsistent inputs.
    pub fn run<P: ConditioningPolicy + ?Sized>(
        &mut self,
        policy: &mut P,
    ) -> PotfieldResult<InversionReport> {
        let max_iterations = self.config.stopping.max_iterations;
        if max_iterations == 0 {
            info!("only forward model calculated");
            let g = self.mesh.compute_frechet(self.properties, &self.data.points)?;
            self.update_forward(&g)?;
            return Ok(self.report(HaltReason::ForwardOnly));
        }

        let mut solves = 0;
        loop {
            let iteration = self.state.iteration + 1;
            info!("start iteration {iteration}");

            let g = self.mesh.compute_frechet(self.properties, &self.data.points)?;
            debug!("Frechet calculated, shape: {:?}", g.dim());
            if self.state.residual.is_none() {
                self.update_forward(&g)?;
                self.state.std_misfit = self.current_std()?;
            }

            if let SolveOutcome::Halted(reason) = self.solve(&g, policy)? {
                return Ok(self.report(reason));
            }
            solves += 1;

            let previous_std = self.state.std_misfit;
            self.update_forward(&g)?;
            let std_misfit = self.current_std()?;
            self.state.std_misfit = std_misfit;
            let rel_misfit = std_misfit / self.data.std_data_ori;
            let variation = (previous_std - std_misfit) / self.data.std_data_ori;
            self.record_iteration(std_misfit, rel_misfit);
            info!(
                "iteration {iteration}: relative misfit {:.4}%, variation {:.4}%",
                rel_misfit * 100.0,
                variation * 100.0
            );

            if variation.abs() < self.config.stopping.max_misfit_variation {
                self.state.stagnant_iterations += 1;
                info!("no more misfit reduction");
            } else {
                self.state.stagnant_iterations = 0;
            }

            if solves >= max_iterations {
                info!("maximum number of iterations reached");
                return Ok(self.report(HaltReason::MaxIterations));
            }
            if rel_misfit < self.config.stopping.max_rel_misfit {
                info!("misfit limit reached");
                return Ok(self.report(HaltReason::MisfitReached));
            }
            if self.state.stagnant_iterations >= STAGNATION_LIMIT {
                info!("misfit stagnates");
                return Ok(self.report(HaltReason::Stagnation));
            }

            if let Some(reason) = self.refine(&g)? {
                return Ok(self.report(reason));
            }

            self.state.lambda = self.damping.lambda.next(self.state.lambda);
            self.state.gamma = self.damping.gamma.next(self.state.gamma);
            info!(
                "new lambda: {:e}; new gamma: {:e}",
                self.state.lambda, self.state.gamma
            );
        }
    }

    /// Form and solve the regularized normal equations, update `params`.
    fn solve<P: ConditioningPolicy + ?Sized>(
        &mut self,
        g: &Array2<f64>,
        policy: &mut P,
    ) -> PotfieldResult<SolveOutcome> {
        let prisms: Vec<_> = self.mesh.prisms().into_iter().map(|(_, p)| p).collect();
        let smoothing = self
            .mesh
            .compute_smoothing(self.properties, &self.config.uncertainty)?;
        let weights =
            self.regularization
                .weights(self.data.n_data(), &prisms, self.mesh.max_depth());
        let n = self.state.params.len();
        if g.ncols() != n || smoothing.dim() != (n, n) || weights.sigma_param.len() != n {
            return Err(PotfieldError::DimensionMismatch {
                context: "inversion: normal equations".to_string(),
                expected: n,
                got: g.ncols(),
            });
        }

        let gct = weighted_transpose(&g.view(), &weights.sigma_data.view())?;
        let normal = gct.dot(g);

        if !self.state.conditioning_checked {
            self.state.conditioning_checked = true;
            let diagnostic = conditioning_diagnostic(
                &normal,
                &weights,
                &smoothing,
                self.state.lambda,
                self.state.gamma,
            );
            self.state.conditioning = Some(diagnostic);
            if is_ill_conditioned(&diagnostic) {
                warn!(
                    "regularization or smoothing much smaller than Frechet: \
                     Frechet/regularization {:.0}, Frechet/smoothing {:.0}",
                    diagnostic.frechet_to_regularization, diagnostic.frechet_to_smoothing
                );
                match policy.decide(&diagnostic) {
                    ConditioningDecision::Continue => {}
                    ConditioningDecision::Abort => {
                        warn!("inversion aborted on conditioning diagnostic");
                        return Ok(SolveOutcome::Halted(HaltReason::Aborted));
                    }
                    ConditioningDecision::Retry { lambda, gamma } => {
                        if !lambda.is_finite() || lambda < 0.0 || !gamma.is_finite() || gamma < 0.0
                        {
                            return Err(PotfieldError::ConfigError(
                                "retry damping must be finite and >= 0".to_string(),
                            ));
                        }
                        info!("initial damping replaced: lambda {lambda:e}, gamma {gamma:e}");
                        self.state.lambda = lambda;
                        self.state.gamma = gamma;
                    }
                }
            }
        }

        let mut ginv = normal;
        for i in 0..n {
            ginv[[i, i]] += self.state.lambda * weights.sigma_param[i];
        }
        ginv.scaled_add(self.state.gamma, &smoothing);

        let inverse = match invert(&ginv) {
            Ok(inverse) => inverse,
            Err(PotfieldError::LinAlg(msg)) => {
                warn!("normal equations not invertible: {msg}");
                return Ok(SolveOutcome::Halted(HaltReason::SingularSystem));
            }
            Err(e) => return Err(e),
        };

        let residual = match &self.state.residual {
            Some(r) => r,
            None => {
                return Err(PotfieldError::LinAlg(
                    "residual not initialised before solve".to_string(),
                ))
            }
        };
        let delta = inverse.dot(&gct.dot(residual));
        self.state.params += &delta;
        self.mesh
            .set_parameters(self.properties, &self.state.params)?;
        self.state.iteration += 1;
        Ok(SolveOutcome::Solved)
    }

    /// `data_mod = G·params`, residual re-centred on its median.
    fn update_forward(&mut self, g: &Array2<f64>) -> PotfieldResult<()> {
        if g.ncols() != self.state.params.len() {
            return Err(PotfieldError::DimensionMismatch {
                context: "inversion: forward response".to_string(),
                expected: self.state.params.len(),
                got: g.ncols(),
            });
        }
        let data_mod = g.dot(&self.state.params);
        let mut residual = &self.data.data_ori - &data_mod;
        let centre = median(&residual.view()).unwrap_or(0.0);
        residual.mapv_inplace(|v| v - centre);
        self.state.data_mod = data_mod;
        self.state.residual = Some(residual);
        Ok(())
    }

    fn current_std(&self) -> PotfieldResult<f64> {
        self.state
            .residual
            .as_ref()
            .and_then(|r| std_population(&r.view()))
            .ok_or_else(|| PotfieldError::LinAlg("residual statistics unavailable".to_string()))
    }

    fn record_iteration(&mut self, std_misfit: f64, rel_misfit: f64) {
        let n = self.state.params.len();
        let history = &mut self.state.history;
        history
            .par_hist
            .push(self.state.params.slice(s![..n - 1]).to_owned());
        history.rms_misfit.push(std_misfit);
        history.rel_rms_misfit.push(rel_misfit * 100.0);
        history.lambda.push(self.state.lambda);
        history.gamma.push(self.state.gamma);
    }

    /// Select and split prisms, rebuild `params`. Returns a halt reason when
    /// the model cannot or must not be refined.
    fn refine(&mut self, g: &Array2<f64>) -> PotfieldResult<Option<HaltReason>> {
        let residual = match &self.state.residual {
            Some(r) => r,
            None => return Ok(Some(HaltReason::NoRefinement)),
        };
        let candidates = self.selector.select(
            residual,
            g,
            &self.data.blocks,
            self.properties,
            &self.mesh,
        )?;
        if candidates.is_empty() {
            info!("prisms reached size limit");
            return Ok(Some(HaltReason::NoRefinement));
        }

        let added: usize = candidates
            .iter()
            .map(|&id| self.mesh.child_count(id).saturating_sub(1))
            .sum();
        let projected = self.mesh.n_prisms() + added;
        if projected > self.data.n_data() {
            warn!(
                "inversion stopped: {projected} prisms would exceed {} data points",
                self.data.n_data()
            );
            return Ok(Some(HaltReason::OverRefinement));
        }

        debug!("split prisms {:?}", candidates);
        let iteration = self.state.iteration;
        for id in candidates {
            let parent = self
                .mesh
                .prisms()
                .into_iter()
                .find(|(pid, _)| *pid == id)
                .ok_or(PotfieldError::UnknownPrism { id: id.0 })?;
            let child_ids = self.mesh.split(id)?;
            let live = self.mesh.prisms();
            let children = child_ids
                .iter()
                .filter_map(|c| live.iter().find(|(pid, _)| pid == c).copied())
                .collect();
            self.state.history.splits.push(SplitRecord {
                iteration,
                parent,
                children,
            });
        }

        let mut params = self.mesh.parameters(self.properties).to_vec();
        params.push(0.0);
        self.state.params = Array1::from_vec(params);
        info!("model now has {} prisms", self.mesh.n_prisms());
        Ok(None)
    }

    fn report(&self, halt_reason: HaltReason) -> InversionReport {
        InversionReport {
            halt_reason,
            iterations: self.state.iteration,
            params: self.state.params.clone(),
            prisms: self.mesh.prisms(),
            data_mod: self.state.data_mod.clone(),
            residual: self
                .state
                .residual
                .clone()
                .unwrap_or_else(|| self.data.data_ori.clone()),
            blocks: self.data.blocks.clone(),
            history: self.state.history.clone(),
            conditioning: self.state.conditioning,
        }
    }
}
