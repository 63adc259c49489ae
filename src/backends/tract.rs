//! Tract segmentation backend
//!
//! Runs an ONNX segmentation model with Tract, a pure Rust inference engine.
//! The model is loaded, shape-fixed and optimized once; each call letterboxes
//! the image, runs the plan and maps the predicted mask back onto the input.

use crate::{
    error::{BgRemovalError, Result},
    models::{ModelSpec, PreprocessingConfig},
    segmentation::{apply_mask, tensor_to_mask, Segmenter},
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GenericImageView, RgbaImage};
use instant::Instant;
use ndarray::Array4;
use tract_onnx::prelude::*;
use tracing::{debug, info, instrument};

/// Type alias for the optimized Tract plan
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Model-backed segmenter using Tract
pub struct TractSegmenter {
    model: TractModel,
    preprocessing: PreprocessingConfig,
    name: String,
}

impl std::fmt::Debug for TractSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractSegmenter")
            .field("name", &self.name)
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl TractSegmenter {
    /// Load and optimize the model described by `spec`
    ///
    /// # Errors
    /// Returns `BgRemovalError::Model` when the file is missing, is not a
    /// valid ONNX graph, or cannot be optimized for a `[1, 3, size, size]` input.
    #[instrument(skip(spec), fields(model = %spec.display_name()))]
    pub fn load(spec: &ModelSpec) -> Result<Self> {
        spec.preprocessing.validate()?;
        let model_data = spec.load_bytes()?;
        Self::from_bytes(&model_data, spec.preprocessing.clone(), spec.display_name())
    }

    /// Build a segmenter from in-memory ONNX bytes
    ///
    /// # Errors
    /// Returns `BgRemovalError::Model` when the graph cannot be loaded or optimized
    pub fn from_bytes(
        model_data: &[u8],
        preprocessing: PreprocessingConfig,
        name: impl Into<String>,
    ) -> Result<Self> {
        let load_start = Instant::now();
        let name = name.into();
        let size = preprocessing.target_size as usize;

        #[allow(clippy::cast_precision_loss)]
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        info!(model = %name, size_mb = %format!("{size_mb:.2}"), "Loading Tract model");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .map_err(|e| BgRemovalError::model(format!("Failed to set model input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::model(format!("Failed to create runnable model: {e}")))?;

        info!(
            model = %name,
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "Tract model ready"
        );

        Ok(Self {
            model,
            preprocessing,
            name,
        })
    }

    /// Preprocessing parameters this segmenter feeds the model with
    #[must_use]
    pub fn preprocessing(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    /// Run the plan on an NCHW tensor and return the first output as `[N, C, H, W]`
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();

        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_shape(input.shape(), &data)
            .map_err(|e| BgRemovalError::segmentation(format!("Failed to build input tensor: {e}")))?;

        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::segmentation(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::segmentation("Model produced no output tensor"))?;
        let view = output.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::segmentation(format!("Output tensor is not f32: {e}"))
        })?;

        let shape = view.shape().to_vec();
        let &[n, c, h, w] = shape.as_slice() else {
            return Err(BgRemovalError::segmentation(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };

        let array = Array4::from_shape_vec((n, c, h, w), view.iter().copied().collect())
            .map_err(|e| BgRemovalError::segmentation(format!("Failed to reshape output: {e}")))?;

        debug!(
            output_shape = ?shape,
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            "Tract inference complete"
        );
        Ok(array)
    }
}

impl Segmenter for TractSegmenter {
    #[instrument(skip(self, image), fields(model = %self.name, width = image.width(), height = image.height()))]
    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let (tensor, transform) =
            ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;
        let output = self.infer(&tensor)?;
        let mask = tensor_to_mask(&output, &transform, image.dimensions())?;
        debug!(foreground_ratio = mask.foreground_ratio(), "Mask extracted");
        apply_mask(image, &mask)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
