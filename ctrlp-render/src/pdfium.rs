use std::env;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ctrlp_core::geometry::POINTS_PER_INCH;
use ctrlp_core::{
    DocumentBackend, DocumentInfo, DocumentProvider, LoadError, PageSize, RenderImage,
    RenderRequest,
};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::{debug, instrument, warn};

use crate::{ensure_pdf_path, to_grayscale};

/// Explicit pdfium shared library to bind, checked before the working
/// directory and the system search path.
pub const PDFIUM_LIBRARY_ENV: &str = "CTRLP_PDFIUM_LIBRARY_PATH";

pub struct PdfiumRenderFactory {
    pdfium: Arc<Pdfium>,
}

impl PdfiumRenderFactory {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_env() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumRenderFactory {
    #[instrument(skip(self))]
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>, LoadError> {
        let absolute = ensure_pdf_path(path)?;
        match PdfiumDocument::open(Arc::clone(&self.pdfium), &absolute) {
            Ok(document) => Ok(Arc::new(document)),
            Err(err) => Err(LoadError::Backend {
                path: absolute,
                message: format!("{err:#}"),
            }),
        }
    }
}

struct PdfiumDocument {
    info: DocumentInfo,
    page_sizes: Vec<PageSize>,
    // Declared before `_pdfium` so it is dropped first.
    document: Mutex<PdfDocument<'static>>,
    _pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    fn open(pdfium: Arc<Pdfium>, path: &Path) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("failed to open {:?}", path))?;
        // SAFETY: the document borrows the bindings owned by `pdfium`, which is moved into
        // `_pdfium` below. Fields drop in declaration order, so the document is released
        // while the bindings it points to are still alive.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };

        let page_sizes: Vec<PageSize> = document
            .pages()
            .iter()
            .map(|page| {
                PageSize::new(
                    f64::from(page.width().value),
                    f64::from(page.height().value),
                )
            })
            .collect();

        let title = document
            .metadata()
            .get(PdfDocumentMetadataTagType::Title)
            .map(|tag| tag.value().trim().to_owned())
            .filter(|title| !title.is_empty());

        debug!(path = %path.display(), pages = page_sizes.len(), "opened pdf");

        Ok(Self {
            info: DocumentInfo {
                path: path.to_path_buf(),
                page_count: page_sizes.len(),
                title,
            },
            page_sizes,
            document: Mutex::new(document),
            _pdfium: pdfium,
        })
    }
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_size(&self, page_index: usize) -> Option<PageSize> {
        self.page_sizes.get(page_index).copied()
    }

    #[instrument(skip(self))]
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        let page_index: PdfPageIndex = request
            .page_index
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", request.page_index))?;

        let document = self.document.lock();
        let page = document
            .pages()
            .get(page_index)
            .with_context(|| format!("page {} out of range", request.page_index))?;

        let scale = (request.dpi / POINTS_PER_INCH) as f32;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("failed to render page {}", request.page_index))?;

        let frame = bitmap.as_image().to_rgba8();
        let image = RenderImage {
            width: frame.width(),
            height: frame.height(),
            pixels: frame.into_raw(),
        };

        if request.grayscale {
            Ok(to_grayscale(image))
        } else {
            Ok(image)
        }
    }
}

fn bind_pdfium_from_env() -> Option<Pdfium> {
    let path = env::var_os(PDFIUM_LIBRARY_ENV).filter(|path| !path.is_empty())?;
    let path = PathBuf::from(path);
    match Pdfium::bind_to_library(&path) {
        Ok(bindings) => Some(Pdfium::new(bindings)),
        Err(err) => {
            warn!(
                "failed to load Pdfium from {} ({}): {}",
                path.display(),
                PDFIUM_LIBRARY_ENV,
                err
            );
            None
        }
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            warn!(path = %cwd_path.display(), %err, "no pdfium next to the working directory");
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; install it or set {} ({})",
                PDFIUM_LIBRARY_ENV,
                errors.join(", ")
            ))
        }
    }
}
