//! ONNX Runtime session shared by the plate localizer and the CRNN recognizer.

use crate::config::OnnxModelConfig;
use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
        TensorRTExecutionProvider,
    },
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    TensorRt,
    Cuda,
    Cpu,
}

impl Provider {
    fn label(self) -> &'static str {
        match self {
            Self::TensorRt => "TensorRT",
            Self::Cuda => "CUDA",
            Self::Cpu => "CPU",
        }
    }

    /// Providers to try, most preferred first
    fn fallback_chain(preference: &str) -> &'static [Provider] {
        match preference.to_uppercase().as_str() {
            "TENSORRT" => &[Self::TensorRt, Self::Cuda, Self::Cpu],
            "CUDA" => &[Self::Cuda, Self::Cpu],
            _ => &[Self::Cpu],
        }
    }

    fn dispatch(self, device_id: i32) -> Vec<ExecutionProviderDispatch> {
        let cpu = CPUExecutionProvider::default().build();
        match self {
            Self::TensorRt => vec![
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                cpu,
            ],
            Self::Cuda => vec![
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                cpu,
            ],
            Self::Cpu => vec![cpu],
        }
    }
}

/// A loaded model plus the execution provider it ended up on
pub struct OnnxSession {
    model: &'static str,
    session: Mutex<Session>,
    execution_provider: &'static str,
}

impl OnnxSession {
    /// Load `config.model_path`, falling back TensorRT -> CUDA -> CPU
    pub fn load(model: &'static str, config: &OnnxModelConfig) -> Result<Self> {
        let chain = Provider::fallback_chain(&config.execution_provider);
        let mut last_error = None;

        for &provider in chain {
            tracing::info!(model, path = %config.model_path, provider = provider.label(), "creating ONNX session");
            match build_session(config, provider) {
                Ok(session) => {
                    tracing::info!(
                        model,
                        path = %config.model_path,
                        provider = provider.label(),
                        device = config.device_id,
                        "ONNX session ready"
                    );
                    return Ok(Self {
                        model,
                        session: Mutex::new(session),
                        execution_provider: provider.label(),
                    });
                }
                Err(e) => {
                    tracing::warn!(model, provider = provider.label(), error = %e, "execution provider unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no execution provider configured")))
            .with_context(|| format!("Failed to load {} model from {}", model, config.model_path))
    }

    pub fn execution_provider(&self) -> &'static str {
        self.execution_provider
    }

    /// Run one input tensor and return the first output found among `output_names`
    pub fn run(&self, input: Array<f32, IxDyn>, output_names: &[&str]) -> Result<Array<f32, IxDyn>> {
        let input_tensor = Value::from_array(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock {} session: {}", self.model, e))?;

        let started = Instant::now();
        let outputs = session.run(ort::inputs![input_tensor])?;
        telemetry::metrics::LPR_INFERENCE_TIME
            .with_label_values(&[self.model, self.execution_provider])
            .observe(started.elapsed().as_secs_f64());

        let output_value = output_names
            .iter()
            .find_map(|name| outputs.get(*name))
            .with_context(|| format!("No {} output tensor found (tried: {})", self.model, output_names.join(", ")))?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;

        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        Ok(Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?)
    }
}

fn build_session(config: &OnnxModelConfig, provider: Provider) -> Result<Session> {
    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(config.intra_threads)
        .context("Failed to set intra threads")?
        .with_inter_threads(config.inter_threads)
        .context("Failed to set inter threads")?
        .with_execution_providers(provider.dispatch(config.device_id))
        .context("Failed to set execution providers")?
        .commit_from_file(&config.model_path)
        .context("Failed to load model from file")?;
    Ok(session)
}
