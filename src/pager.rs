//! Bounded circular pagination cursor.
//!
//! A [`Pager`] owns a cursor over `[0, page_count)` and an injected render
//! function. `advance`/`retreat` wrap around at the edges, so neither can
//! fail on a boundary. The cursor only commits after the next page rendered
//! successfully: a failed render surfaces the error and leaves the pager
//! exactly where it was.

use crate::error::PagerError;

/// Renders the content of one page. Closures close over the precomputed
/// items for their result set; the pager never inspects page contents.
pub type RenderFn<P> =
  Box<dyn Fn(usize) -> Result<P, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Circular cursor over a fixed number of pages.
pub struct Pager<P> {
  page: usize,
  page_count: usize,
  render: RenderFn<P>,
}

impl<P> Pager<P> {
  /// Create a pager positioned at `start_page`.
  ///
  /// Requires `page_count >= 1` and `start_page < page_count`.
  pub fn new(start_page: usize, page_count: usize, render: RenderFn<P>) -> Result<Self, PagerError> {
    if page_count == 0 || start_page >= page_count {
      return Err(PagerError::InvalidPageRange {
        start: start_page,
        count: page_count,
      });
    }

    Ok(Self {
      page: start_page,
      page_count,
      render,
    })
  }

  /// The page the cursor currently points at.
  pub fn page(&self) -> usize {
    self.page
  }

  pub fn page_count(&self) -> usize {
    self.page_count
  }

  /// Render the current page without moving the cursor.
  pub fn current(&self) -> Result<P, PagerError> {
    (self.render)(self.page).map_err(PagerError::Render)
  }

  /// Move forward one page, wrapping past the last page to the first.
  pub fn advance(&mut self) -> Result<P, PagerError> {
    self.goto((self.page + 1) % self.page_count)
  }

  /// Move back one page, wrapping past the first page to the last.
  pub fn retreat(&mut self) -> Result<P, PagerError> {
    self.goto((self.page + self.page_count - 1) % self.page_count)
  }

  fn goto(&mut self, next: usize) -> Result<P, PagerError> {
    let rendered = (self.render)(next).map_err(PagerError::Render)?;
    self.page = next;
    Ok(rendered)
  }
}
