//! Technique side panel: fetch-or-default on open, debounced autosave on
//! edit, explicit save-now.

use mats_core::models::{NodeId, TechniqueNote};

use crate::editor::{messages, Editor, EditorError, TechniquePanel};

impl Editor {
    /// Open the panel for `node`, loading its note. A node with no stored
    /// note opens with empty fields. When the note cannot be loaded the panel
    /// stays closed, so an empty draft never overwrites the stored one.
    pub async fn open_technique(&mut self, node: NodeId) -> Result<&TechniquePanel, EditorError> {
        if !self.node_in_active_graph(node) {
            return Err(EditorError::UnknownNode(node));
        }

        // Edits still waiting on the debounce go out before the panel moves
        // on; the slot holds a single snapshot.
        self.technique_saver.flush().await;

        let draft = match self.backend.get_technique(node).await {
            Ok(Some(note)) => note,
            Ok(None) => TechniqueNote::default(),
            Err(e) => {
                tracing::warn!(node_id = %node, error = %e, "Failed to load technique note");
                self.banner.raise(messages::TECHNIQUE_LOAD_FAILED);
                self.technique = None;
                return Err(e.into());
            }
        };

        Ok(self.technique.insert(TechniquePanel { node, draft }))
    }

    pub fn technique_panel(&self) -> Option<&TechniquePanel> {
        self.technique.as_ref()
    }

    pub fn edit_video_url(&mut self, video_url: &str) -> Result<(), EditorError> {
        self.edit_technique(|draft| draft.video_url = video_url.to_string())
    }

    pub fn edit_steps(&mut self, steps: &str) -> Result<(), EditorError> {
        self.edit_technique(|draft| draft.steps = steps.to_string())
    }

    fn edit_technique(&mut self, edit: impl FnOnce(&mut TechniqueNote)) -> Result<(), EditorError> {
        let panel = self
            .technique
            .as_mut()
            .ok_or(EditorError::NoTechniquePanel)?;
        edit(&mut panel.draft);
        self.technique_saver
            .schedule((panel.node, panel.draft.clone()));
        Ok(())
    }

    /// Save the open draft now, bypassing the debounce.
    pub async fn save_technique_now(&mut self) -> Result<TechniqueNote, EditorError> {
        let panel = self.technique.as_ref().ok_or(EditorError::NoTechniquePanel)?;
        let (node, draft) = (panel.node, panel.draft.clone());

        // A pending autosave for this node is superseded by the save below;
        // one for a previously opened node still has to go out.
        if let Some((pending, note)) = self.technique_saver.take() {
            if pending != node {
                if let Err(e) = self.backend.save_technique(pending, &note).await {
                    tracing::warn!(node_id = %pending, error = %e, "Technique autosave failed");
                    self.banner.raise(messages::TECHNIQUE_SAVE_FAILED);
                }
            }
        }
        match self.backend.save_technique(node, &draft).await {
            Ok(saved) => {
                tracing::debug!(node_id = %node, "Technique note saved");
                Ok(saved)
            }
            Err(e) => {
                tracing::warn!(node_id = %node, error = %e, "Technique save failed");
                self.banner.raise(messages::TECHNIQUE_SAVE_FAILED);
                Err(e.into())
            }
        }
    }

    /// Close the panel. An autosave already scheduled still runs.
    pub fn close_technique(&mut self) {
        self.technique = None;
    }

    pub fn technique_save_pending(&self) -> bool {
        self.technique_saver.is_pending()
    }
}
