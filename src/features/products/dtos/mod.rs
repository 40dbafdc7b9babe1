mod product_dto;

pub use product_dto::{
    CategoryProductsDto, CreateProductDto, DeleteProductResponseDto, ProductResponseDto,
    UpdateProductDto,
};
