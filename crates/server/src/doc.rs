use utoipa::OpenApi;

/// API Documentation; paths are collected from the routers
#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "Health", description = "Service health"),
        (name = "Batches", description = "Batch lifecycle management"),
        (name = "Enrollments", description = "Student enrollment into batches"),
    ),
    info(
        title = "Batch Lifecycle API",
        version = "1.0.0",
        description = "Course batch scheduling and status management",
        license(
            name = "MIT OR Apache-2.0",
        )
    )
)]
pub struct ApiDoc;
