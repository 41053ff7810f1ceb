//! Wire shapes of the backend contract.
//!
//! The backend is inconsistent about envelopes and field names; every
//! variant observed in the wild is accepted here and normalised into the
//! domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use storefront_cart::ProductSnapshot;
use storefront_checkout::{Customer, InvoiceConfirmation, InvoiceSubmission};
use storefront_core::{CustomerId, EmployeeId, Money, ProductId};

/// Placeholder when the backend confirms a sale without an invoice number.
pub const MISSING_INVOICE_NUMBER: &str = "N/A";

/// Accepts `"123"` and `123` alike.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Number(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDto {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub codigo: Option<String>,
    #[serde(default)]
    pub nombre: String,
    #[serde(default, rename = "precioVenta")]
    pub precio_venta: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<i64>,
}

impl From<ProductDto> for ProductSnapshot {
    fn from(dto: ProductDto) -> Self {
        ProductSnapshot {
            id: ProductId::new(dto.id),
            code: dto.codigo.unwrap_or_default(),
            name: dto.nombre,
            sale_price: Money::saturating(dto.precio_venta.unwrap_or_default()),
            stock: dto.stock,
        }
    }
}

/// `GET /productos`: `{ productos: [...] }` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductListResponse {
    Wrapped { productos: Vec<ProductDto> },
    Bare(Vec<ProductDto>),
}

impl ProductListResponse {
    pub fn into_snapshots(self) -> Vec<ProductSnapshot> {
        let dtos = match self {
            ProductListResponse::Wrapped { productos } => productos,
            ProductListResponse::Bare(productos) => productos,
        };
        dtos.into_iter().map(ProductSnapshot::from).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDto {
    pub id: i64,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub apellido: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cedula: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub documento: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub telefono: Option<String>,
}

impl From<CustomerDto> for Customer {
    fn from(dto: CustomerDto) -> Self {
        let document_id = dto
            .cedula
            .filter(|c| !c.is_empty())
            .or(dto.documento)
            .unwrap_or_default();
        Customer {
            id: CustomerId::new(dto.id),
            first_name: dto.nombre,
            last_name: dto.apellido,
            document_id,
            phone: dto.telefono.filter(|t| !t.is_empty()),
        }
    }
}

/// `GET /clientes`: a bare array, `{ data: [...] }` or `{ clientes: [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CustomerListResponse {
    Bare(Vec<CustomerDto>),
    Data { data: Vec<CustomerDto> },
    Clientes { clientes: Vec<CustomerDto> },
}

impl CustomerListResponse {
    pub fn into_customers(self) -> Vec<Customer> {
        let dtos = match self {
            CustomerListResponse::Bare(list)
            | CustomerListResponse::Data { data: list }
            | CustomerListResponse::Clientes { clientes: list } => list,
        };
        dtos.into_iter().map(Customer::from).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineDto {
    pub producto_id: i64,
    pub cantidad: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub descuento: Decimal,
}

/// `POST /facturas` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequestDto {
    pub cliente_id: i64,
    pub empleado_id: i64,
    pub metodo_pago: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub impuesto: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub descuento: Decimal,
    pub notas: String,
    pub detalles: Vec<InvoiceLineDto>,
}

impl From<&InvoiceSubmission> for InvoiceRequestDto {
    fn from(submission: &InvoiceSubmission) -> Self {
        InvoiceRequestDto {
            cliente_id: submission.customer_id.get(),
            empleado_id: submission.employee_id.get(),
            metodo_pago: submission.payment_method.as_wire(),
            impuesto: submission.tax,
            descuento: submission.discount,
            notas: submission.notes.clone(),
            detalles: submission
                .lines
                .iter()
                .map(|line| InvoiceLineDto {
                    producto_id: line.product_id.get(),
                    cantidad: line.quantity,
                    descuento: line.discount_percent,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceNumberDto {
    #[serde(default, rename = "numeroFactura", deserialize_with = "lenient_string")]
    pub numero_factura: Option<String>,
}

/// `POST /facturas` response: `{ numeroFactura }` or `{ factura: { numeroFactura } }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceResponseDto {
    #[serde(default, rename = "numeroFactura", deserialize_with = "lenient_string")]
    pub numero_factura: Option<String>,
    #[serde(default)]
    pub factura: Option<InvoiceNumberDto>,
}

impl From<InvoiceResponseDto> for InvoiceConfirmation {
    fn from(dto: InvoiceResponseDto) -> Self {
        let number = dto
            .numero_factura
            .filter(|n| !n.is_empty())
            .or_else(|| dto.factura.and_then(|f| f.numero_factura))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| MISSING_INVOICE_NUMBER.to_string());
        InvoiceConfirmation::new(number)
    }
}

/// Error body: the human-readable text is in `message` or `mensaje`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.trim().is_empty())
            .or(self.mensaje.filter(|m| !m.trim().is_empty()))
    }
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub usuario: String,
    pub password: String,
    pub tenant_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default, rename = "empleadoId")]
    pub employee_id: Option<EmployeeId>,
    #[serde(default, rename = "usuario")]
    pub username: Option<String>,
    #[serde(default, rename = "rol")]
    pub role: Option<String>,
    #[serde(default, rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(default, rename = "apellido")]
    pub last_name: Option<String>,
    #[serde(default, rename = "cargo")]
    pub position: Option<String>,
}

impl LoginResponse {
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        let name = format!("{first} {last}").trim().to_string();
        match (name.is_empty(), &self.username) {
            (true, Some(username)) => username.clone(),
            (true, None) => "Usuario".to_string(),
            (false, _) => name,
        }
    }
}
