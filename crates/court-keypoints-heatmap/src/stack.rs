use court_keypoints_core::GrayImage;

/// Shape errors at the heatmap boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeatmapError {
    #[error("expected {expected} channels, got {got}")]
    ChannelCountMismatch { expected: usize, got: usize },
    #[error("invalid heatmap dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("buffer length {got} does not match shape ({expected} expected)")]
    BufferLength { expected: usize, got: usize },
}

/// Borrowed single-channel score map, row-major.
#[derive(Clone, Copy, Debug)]
pub struct ScoreMapView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [f32],
}

impl ScoreMapView<'_> {
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<f32> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize).copied()
    }
}

/// Mutable single-channel score map, row-major.
#[derive(Debug)]
pub struct ScoreMapMut<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a mut [f32],
}

/// `channels x height x width` stack of `f32` score maps.
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapStack {
    channels: usize,
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl HeatmapStack {
    /// All-zero stack.
    pub fn zeros(channels: usize, width: usize, height: usize) -> Result<Self, HeatmapError> {
        if width == 0 || height == 0 {
            return Err(HeatmapError::InvalidDimensions { width, height });
        }
        Ok(Self {
            channels,
            width,
            height,
            data: vec![0.0; channels * width * height],
        })
    }

    /// Wrap an existing channel-major buffer.
    pub fn from_raw(
        channels: usize,
        width: usize,
        height: usize,
        data: Vec<f32>,
    ) -> Result<Self, HeatmapError> {
        if width == 0 || height == 0 {
            return Err(HeatmapError::InvalidDimensions { width, height });
        }
        let expected = channels * width * height;
        if data.len() != expected {
            return Err(HeatmapError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            channels,
            width,
            height,
            data,
        })
    }

    /// Stack 8-bit channel images (value / 255). All images must share a size.
    pub fn from_gray_channels(images: &[GrayImage]) -> Result<Self, HeatmapError> {
        let Some(first) = images.first() else {
            return Err(HeatmapError::ChannelCountMismatch {
                expected: 1,
                got: 0,
            });
        };
        let (width, height) = (first.width, first.height);
        let mut out = Self::zeros(images.len(), width, height)?;
        for (c, img) in images.iter().enumerate() {
            if img.width != width || img.height != height {
                return Err(HeatmapError::InvalidDimensions {
                    width: img.width,
                    height: img.height,
                });
            }
            if img.data.len() != width * height {
                return Err(HeatmapError::BufferLength {
                    expected: width * height,
                    got: img.data.len(),
                });
            }
            let plane = &mut out.data[c * width * height..(c + 1) * width * height];
            for (dst, src) in plane.iter_mut().zip(&img.data) {
                *dst = *src as f32 / 255.0;
            }
        }
        Ok(out)
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    fn plane(&self) -> usize {
        self.width * self.height
    }

    pub fn channel(&self, index: usize) -> Option<ScoreMapView<'_>> {
        if index >= self.channels {
            return None;
        }
        let n = self.plane();
        Some(ScoreMapView {
            width: self.width,
            height: self.height,
            data: &self.data[index * n..(index + 1) * n],
        })
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<ScoreMapMut<'_>> {
        if index >= self.channels {
            return None;
        }
        let n = self.plane();
        let (width, height) = (self.width, self.height);
        Some(ScoreMapMut {
            width,
            height,
            data: &mut self.data[index * n..(index + 1) * n],
        })
    }

    /// Channel `index` quantized to 8 bits (`score * 255`, saturating).
    pub fn channel_to_gray(&self, index: usize) -> Option<GrayImage> {
        let view = self.channel(index)?;
        Some(GrayImage {
            width: view.width,
            height: view.height,
            data: view
                .data
                .iter()
                .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
                .collect(),
        })
    }
}
