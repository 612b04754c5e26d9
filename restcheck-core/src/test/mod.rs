use slog::{Drain, Logger};

use crate::spec::OpenApiDocument;

/// Logger writing to stdout, captured by the test harness.
pub(crate) struct TestLogger;

impl TestLogger {
    pub(crate) fn stdout() -> Logger {
        let decorator = slog_term::PlainDecorator::new(slog_term::TestStdoutWriter);
        let drain = slog_term::CompactFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();

        Logger::root(drain, slog::o!())
    }
}

/// A minimal OpenAPI document wrapping the given `paths` entries.
///
/// A `Register` component schema is always available for `$ref`s.
pub(crate) fn openapi_document(openapi_paths: &str) -> OpenApiDocument {
    OpenApiDocument::parse(&format!(
        r#"openapi: "3.0.0"
info:
  title: Test API
  version: "1.0.0"

paths:
{openapi_paths}

components:
  schemas:
    Register:
      type: object
      properties:
        title:
          type: string
        version:
          type: string
        description:
          type: string
      required: [title, version]
"#
    ))
    .unwrap()
}
