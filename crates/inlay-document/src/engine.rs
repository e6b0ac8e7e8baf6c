// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Insertion engine — apply one instruction set to one source document and
// write the result.
//
// Every call owns its document and temp files for exactly its own duration:
//
//   Idle -> Opened      validate, fetch the source if remote, open it
//   Opened -> Applying  type-check every insertion, then place them in order
//   Applying -> Saved   write to a temp file beside the output, rename over it
//   Applying -> Failed  first error wins; nothing is written
//   * -> Closed         document and downloads dropped on every path

use std::path::PathBuf;
use std::time::Duration;

use inlay_core::error::{InlayError, Result};
use inlay_core::{
    EngineConfig, ImageInsertion, Insertion, InsertionBody, InstructionSet, Position,
    TextInsertion,
};
use lopdf::ObjectId;
use tracing::{debug, info, instrument, warn};

use crate::coords::CoordinateReconciler;
use crate::fetch;
use crate::image;
use crate::pages;
use crate::pdf::{PdfDocument, StandardFont, content};

/// Applies instruction sets. Holds configuration only, so one engine can
/// serve any number of concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct InsertionEngine {
    config: EngineConfig,
}

impl InsertionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply `instructions` and return the output path.
    #[instrument(skip_all, fields(
        pdf_path = %instructions.pdf_path,
        output_path = %instructions.output_path,
        insertions = instructions.insertions.len(),
    ))]
    pub fn process(&self, instructions: &InstructionSet) -> Result<PathBuf> {
        instructions.validate()?;

        // Held until return so a downloaded source outlives the document.
        let source = fetch::fetch(&instructions.pdf_path, self.fetch_timeout())?;
        if !source.path().exists() {
            return Err(InlayError::NotFound(source.path().to_path_buf()));
        }
        let mut document = PdfDocument::open(source.path())?;
        info!(pages = document.page_count(), "Source opened");

        let insertions = instructions
            .insertions
            .iter()
            .map(|request| request.to_insertion())
            .collect::<Result<Vec<_>>>()?;

        for (index, insertion) in insertions.iter().enumerate() {
            self.apply(&mut document, index, insertion)?;
        }

        let output = PathBuf::from(&instructions.output_path);
        document.save_atomic(&output)?;
        info!(output = %output.display(), "Instructions applied");
        Ok(output)
    }

    fn apply(&self, document: &mut PdfDocument, index: usize, insertion: &Insertion) -> Result<()> {
        let targets = pages::resolve(&insertion.pages, document.page_count());
        if targets.is_empty() {
            debug!(index, pages = ?insertion.pages, "Insertion targets no pages");
            return Ok(());
        }
        let page_ids = targets
            .iter()
            .map(|page| document.page_id(*page))
            .collect::<Result<Vec<_>>>()?;

        match &insertion.body {
            InsertionBody::Text(text) => {
                self.place_text(document, &page_ids, insertion.position, text)
            }
            InsertionBody::Image(image) => {
                self.place_image(document, &page_ids, insertion.position, image)
            }
        }?;
        debug!(index, pages = ?targets, "Insertion applied");
        Ok(())
    }

    fn place_text(
        &self,
        document: &mut PdfDocument,
        page_ids: &[ObjectId],
        at: Position,
        text: &TextInsertion,
    ) -> Result<()> {
        if text.content.is_empty() {
            debug!("Empty text, nothing to draw");
            return Ok(());
        }

        let font = StandardFont::lookup(&text.font_name).unwrap_or_else(|| {
            warn!(font = %text.font_name, "Unknown font, using Helvetica");
            StandardFont::HELVETICA
        });

        for &page_id in page_ids {
            let reconciler = self.reconciler(document, page_id);
            let resource = document.font_resource(page_id, font)?;
            let ops = content::text_operations(&reconciler, at, text, &resource);
            document.append_overlay(page_id, ops)?;
        }
        Ok(())
    }

    fn place_image(
        &self,
        document: &mut PdfDocument,
        page_ids: &[ObjectId],
        at: Position,
        request: &ImageInsertion,
    ) -> Result<()> {
        let prepared = image::prepare(request, &self.config)?;
        let (dx, dy, width, height) = prepared.fit(self.config.keep_proportion);
        let top_left = Position {
            x: at.x + dx,
            y: at.y + dy,
        };

        // One XObject shared by every target page.
        let xobject = document.add_image(&prepared.samples);
        for &page_id in page_ids {
            let reconciler = self.reconciler(document, page_id);
            let resource = document.xobject_resource(page_id, xobject)?;
            let ops = content::image_operations(&reconciler, top_left, width, height, &resource);
            document.append_overlay(page_id, ops)?;
        }
        Ok(())
    }

    fn reconciler(&self, document: &PdfDocument, page_id: ObjectId) -> CoordinateReconciler {
        CoordinateReconciler::new(document.page_box(page_id), &self.config)
            .with_rotation(document.page_rotation(page_id))
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.fetch_timeout_secs)
    }
}

/// Apply `instructions` with `config`; returns the output path.
pub fn process(instructions: &InstructionSet, config: &EngineConfig) -> Result<PathBuf> {
    InsertionEngine::new(config.clone()).process(instructions)
}
